//! Byte-level qualification of candidate index keys.
//!
//! A prefix or range scan can return keys that do not satisfy the hints:
//! truncated strings, NaN floats, NULL collisions with the maximum value,
//! and repeated geo-index entries for one entity. Each [`Strategy`] inspects
//! the raw key and the set keeps the most restrictive verdict.

use std::cmp::Ordering;
use std::fmt;

use rustc_hash::FxHashSet;

use crate::codec::key;
use crate::primitives::bytes::ord::NAN_BYTES;

/// Verdict of a qualification pass, ordered from most to least restrictive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Qualified {
    /// The key cannot match.
    Incompatible,
    /// The key may match; the base record decides.
    Uncertain,
    /// The key matches.
    Compatible,
}

impl fmt::Display for Qualified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Qualified::Incompatible => "INCOMPATIBLE",
            Qualified::Uncertain => "UNCERTAIN",
            Qualified::Compatible => "COMPATIBLE",
        };
        f.write_str(s)
    }
}

/// One predicate over a raw index key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Bit `15 - field` of the bitmap at `offset` must equal `target_null`.
    CheckNull {
        /// Field position in the index.
        field: usize,
        /// Offset of the nullable bitmap.
        offset: usize,
        /// Expected null state.
        target_null: bool,
    },
    /// The eight bytes at `offset` must not be the NaN pattern.
    CheckNaN {
        /// Offset of the float field.
        offset: usize,
    },
    /// Stored bytes equal to a truncated string bound are undecidable.
    CompareTruncated {
        /// Encoded (truncated) bound.
        bound: Vec<u8>,
        /// Offset of the string field.
        offset: usize,
        /// True for a lower bound, false for an upper bound.
        lower: bool,
    },
    /// Only the first key seen per entity suffix passes.
    DedupGeoIndex {
        /// Width of the entity suffix.
        suffix_len: usize,
    },
    /// Fixed verdict decided while encoding the hints.
    Constant(Qualified),
}

impl Strategy {
    fn check(&self, key: &[u8]) -> Qualified {
        match self {
            Strategy::CheckNull {
                field,
                offset,
                target_null,
            } => {
                if key::is_null_at(key, *offset, *field) == *target_null {
                    Qualified::Compatible
                } else {
                    Qualified::Incompatible
                }
            }
            Strategy::CheckNaN { offset } => {
                if key[*offset..*offset + NAN_BYTES.len()] == NAN_BYTES {
                    Qualified::Incompatible
                } else {
                    Qualified::Compatible
                }
            }
            Strategy::CompareTruncated {
                bound,
                offset,
                lower,
            } => {
                let stored = &key[*offset..*offset + bound.len()];
                let ord = bound.as_slice().cmp(stored);
                if *lower {
                    assert!(
                        ord != Ordering::Greater,
                        "index key sorts below its truncated lower bound"
                    );
                } else {
                    assert!(
                        ord != Ordering::Less,
                        "index key sorts above its truncated upper bound"
                    );
                }
                if ord == Ordering::Equal {
                    Qualified::Uncertain
                } else {
                    Qualified::Compatible
                }
            }
            Strategy::DedupGeoIndex { .. } => Qualified::Compatible,
            Strategy::Constant(verdict) => *verdict,
        }
    }
}

/// Strategies registered by a path plus the geo dedup state of one execution.
#[derive(Clone, Debug, Default)]
pub struct StrategySet {
    strategies: Vec<Strategy>,
    dedup_suffix: Option<usize>,
    seen: FxHashSet<Vec<u8>>,
}

impl StrategySet {
    /// Creates an empty set; an empty set qualifies every key as compatible.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy. Geo dedup is kept at most once.
    pub fn insert(&mut self, strategy: Strategy) {
        if let Strategy::DedupGeoIndex { suffix_len } = strategy {
            self.dedup_suffix = Some(suffix_len);
            return;
        }
        self.strategies.push(strategy);
    }

    /// Registered strategies, dedup excluded.
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// True when geo dedup is active.
    pub fn dedups_geo(&self) -> bool {
        self.dedup_suffix.is_some()
    }

    /// Minimum verdict over every strategy.
    ///
    /// Geo dedup runs last and only records a suffix for keys that the other
    /// strategies did not reject, so a rejected entry never hides a later
    /// matching entry of the same entity.
    pub fn qualify(&mut self, key: &[u8]) -> Qualified {
        let mut verdict = Qualified::Compatible;
        for strategy in &self.strategies {
            verdict = verdict.min(strategy.check(key));
            if verdict == Qualified::Incompatible {
                return verdict;
            }
        }
        if let Some(suffix_len) = self.dedup_suffix {
            let suffix = &key[key.len() - suffix_len..];
            if !self.seen.insert(suffix.to_vec()) {
                return Qualified::Incompatible;
            }
        }
        verdict
    }

    /// Forgets every suffix seen by geo dedup; a no-op for non-geo sets.
    pub fn reset(&mut self) {
        if self.dedups_geo() {
            self.seen.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_takes_minimum_verdict() {
        let mut set = StrategySet::new();
        assert_eq!(set.qualify(b"anything"), Qualified::Compatible);
        set.insert(Strategy::Constant(Qualified::Uncertain));
        assert_eq!(set.qualify(b"anything"), Qualified::Uncertain);
        set.insert(Strategy::Constant(Qualified::Incompatible));
        assert_eq!(set.qualify(b"anything"), Qualified::Incompatible);
    }

    #[test]
    fn check_null_reads_bitmap_bit() {
        let mut key = vec![0u8; 4];
        key.extend_from_slice(&key::null_bitmap(&[false, true]));
        let want_null = Strategy::CheckNull {
            field: 1,
            offset: 4,
            target_null: true,
        };
        let want_value = Strategy::CheckNull {
            field: 0,
            offset: 4,
            target_null: true,
        };
        assert_eq!(want_null.check(&key), Qualified::Compatible);
        assert_eq!(want_value.check(&key), Qualified::Incompatible);
    }

    #[test]
    fn check_nan_matches_all_ones() {
        let strategy = Strategy::CheckNaN { offset: 1 };
        let mut key = vec![0u8];
        key.extend_from_slice(&NAN_BYTES);
        assert_eq!(strategy.check(&key), Qualified::Incompatible);
        key[3] = 0xFE;
        assert_eq!(strategy.check(&key), Qualified::Compatible);
    }

    #[test]
    fn truncated_bound_equal_is_uncertain() {
        let lower = Strategy::CompareTruncated {
            bound: b"abc".to_vec(),
            offset: 0,
            lower: true,
        };
        assert_eq!(lower.check(b"abcX"), Qualified::Uncertain);
        assert_eq!(lower.check(b"abdX"), Qualified::Compatible);
    }

    #[test]
    #[should_panic(expected = "truncated lower bound")]
    fn truncated_lower_bound_asserts_order() {
        let lower = Strategy::CompareTruncated {
            bound: b"abc".to_vec(),
            offset: 0,
            lower: true,
        };
        lower.check(b"abb");
    }

    #[test]
    fn geo_dedup_passes_first_suffix_only() {
        let mut set = StrategySet::new();
        set.insert(Strategy::DedupGeoIndex { suffix_len: 2 });
        assert_eq!(set.qualify(b"1v1"), Qualified::Compatible);
        assert_eq!(set.qualify(b"2v1"), Qualified::Incompatible);
        assert_eq!(set.qualify(b"2v2"), Qualified::Compatible);
        set.reset();
        assert_eq!(set.qualify(b"3v1"), Qualified::Compatible);
    }

    #[test]
    fn only_geo_sets_report_dedup() {
        let mut set = StrategySet::new();
        set.insert(Strategy::CheckNaN { offset: 0 });
        assert!(!set.dedups_geo());
        set.insert(Strategy::DedupGeoIndex { suffix_len: 4 });
        set.insert(Strategy::DedupGeoIndex { suffix_len: 4 });
        assert!(set.dedups_geo());
        assert_eq!(set.strategies().len(), 1);
    }

    #[test]
    fn rejected_key_does_not_mark_suffix_seen() {
        let mut set = StrategySet::new();
        set.insert(Strategy::CheckNaN { offset: 0 });
        set.insert(Strategy::DedupGeoIndex { suffix_len: 1 });
        let mut nan_key = NAN_BYTES.to_vec();
        nan_key.push(b'a');
        let mut ok_key = vec![0u8; 8];
        ok_key.push(b'a');
        assert_eq!(set.qualify(&nan_key), Qualified::Incompatible);
        assert_eq!(set.qualify(&ok_key), Qualified::Compatible);
    }
}
