//! Scan keys and qualification strategies derived from column hints.
//!
//! Hints are consumed in index-field order. Every hint but the last must be
//! an equality; the last one picks the path flavour. A [`PrefixPath`] scans
//! all keys that start with the encoded equalities. A [`RangePath`] scans
//! the half-open `[start, end)` built from the last hint's bounds.
//!
//! Index keys have a fixed length per index, which lets a bound be made
//! inclusive or exclusive by appending a run of `0xFF` one byte longer than
//! the rest of the key: `value ++ 0xFF * (rest + 1)` sorts after every key
//! whose field equals `value`.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::strategy::{Qualified, Strategy, StrategySet};
use crate::codec::index_value::{self, encode_null, encode_value};
use crate::codec::key;
use crate::error::{LookupError, Result};
use crate::meta::{ColumnType, IndexDef, IndexField, Schema};
use crate::types::{IndexId, PartitionId};
use crate::value::Value;

/// How a hint restricts its column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    /// Equality on `begin`.
    Prefix,
    /// Bounded on one or both sides.
    Range,
}

/// Constraint on one indexed column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnHint {
    /// Index field name.
    pub column: String,
    /// Equality or range.
    pub scan_type: ScanType,
    /// Equality value, or lower bound of a range.
    pub begin: Option<Value>,
    /// Upper bound of a range.
    pub end: Option<Value>,
    /// Whether the lower bound is inclusive.
    pub include_begin: bool,
    /// Whether the upper bound is inclusive.
    pub include_end: bool,
}

impl ColumnHint {
    /// `column == value`.
    pub fn equal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            scan_type: ScanType::Prefix,
            begin: Some(value.into()),
            end: None,
            include_begin: true,
            include_end: false,
        }
    }

    /// Range hint; `None` leaves that side unbounded.
    pub fn range(
        column: impl Into<String>,
        begin: Option<Value>,
        include_begin: bool,
        end: Option<Value>,
        include_end: bool,
    ) -> Self {
        Self {
            column: column.into(),
            scan_type: ScanType::Range,
            begin,
            end,
            include_begin,
            include_end,
        }
    }

    /// `begin <= column < end`.
    pub fn half_open(column: impl Into<String>, begin: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::range(column, Some(begin.into()), true, Some(end.into()), false)
    }

    fn equality(&self) -> &Value {
        self.begin.as_ref().unwrap_or(&Value::Null)
    }
}

/// Key bounds handed to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanRange<'a> {
    /// All keys starting with the prefix.
    Prefix(&'a [u8]),
    /// Keys in `[start, end)`.
    Range(&'a [u8], &'a [u8]),
}

/// State shared by both path flavours.
#[derive(Clone, Debug)]
struct PathCore {
    index_id: IndexId,
    fields: Vec<IndexField>,
    hints: Vec<ColumnHint>,
    hint_cols: Vec<usize>,
    strategies: StrategySet,
    nullable_offset: usize,
    total_key_len: usize,
    suffix_len: usize,
    desc: String,
}

impl PathCore {
    fn new(index: &IndexDef, schema: &Schema, hints: &[ColumnHint], vid_len: usize) -> Result<Self> {
        index.validate()?;
        assert!(
            hints.len() <= index.fields.len(),
            "more column hints than index fields"
        );
        let mut normalised = Vec::with_capacity(hints.len());
        let mut hint_cols = Vec::with_capacity(hints.len());
        for (hint, field) in hints.iter().zip(&index.fields) {
            assert_eq!(
                hint.column, field.name,
                "column hints must follow index field order"
            );
            let (pos, _) = schema
                .field(&field.name)
                .ok_or_else(|| LookupError::FieldNotFound(field.name.clone()))?;
            hint_cols.push(pos);
            normalised.push(normalise_hint(hint, field.ty));
        }
        let suffix_len = if index.is_edge() {
            key::edge_suffix_len(vid_len)
        } else {
            key::vertex_suffix_len(vid_len)
        };
        let nullable_offset = key::INDEX_PREFIX_LEN + index.fields_len();
        let bitmap_len = if index.has_nullable() {
            key::NULL_BITMAP_LEN
        } else {
            0
        };
        Ok(Self {
            index_id: index.id,
            fields: index.fields.clone(),
            hints: normalised,
            hint_cols,
            strategies: StrategySet::new(),
            nullable_offset,
            total_key_len: nullable_offset + bitmap_len + suffix_len,
            suffix_len,
            desc: String::new(),
        })
    }

    /// Appends the equality encoding of hint `i` to `key`, registering the
    /// strategies its encoding calls for.
    fn encode_equality(&mut self, i: usize, key: &mut Vec<u8>) -> Result<()> {
        let field = &self.fields[i];
        let value = self.hints[i].equality();
        let is_null = value.is_null();
        let encoded = if is_null {
            encode_null(field.ty, field.len)
        } else {
            let encoded = encode_value(value, field.ty, field.len)?;
            if field.ty.is_string() && index_value::is_full_string(&encoded) {
                self.strategies.insert(Strategy::Constant(Qualified::Uncertain));
            }
            encoded
        };
        // NULL shares its encoding with the maximum value of the type.
        if field.nullable {
            self.strategies.insert(Strategy::CheckNull {
                field: i,
                offset: self.nullable_offset,
                target_null: is_null,
            });
        } else if is_null {
            self.strategies
                .insert(Strategy::Constant(Qualified::Incompatible));
        }
        key.extend_from_slice(&encoded);
        let _ = write!(self.desc, "{}={}, ", self.hints[i].column, value);
        Ok(())
    }

    fn register_geo_dedup_after(&mut self, consumed: usize) {
        if self.fields[consumed..]
            .iter()
            .any(|f| f.ty == ColumnType::Geography)
        {
            self.strategies.insert(Strategy::DedupGeoIndex {
                suffix_len: self.suffix_len,
            });
        }
    }

    fn equalities_hold(&self, row: &[Value], count: usize) -> bool {
        self.hints[..count]
            .iter()
            .zip(&self.hint_cols)
            .zip(&self.fields)
            .all(|((hint, col), field)| {
                field.ty == ColumnType::Geography || row[*col] == *hint.equality()
            })
    }
}

/// Scans every key sharing the encoded equality prefix.
#[derive(Clone, Debug)]
pub struct PrefixPath {
    core: PathCore,
    prefix: Vec<u8>,
}

impl PrefixPath {
    fn build(mut core: PathCore) -> Result<Self> {
        let mut prefix = key::index_prefix(PartitionId(0), core.index_id);
        for i in 0..core.hints.len() {
            core.encode_equality(i, &mut prefix)?;
        }
        core.register_geo_dedup_after(core.hints.len());
        let trimmed = core.desc.trim_end_matches(", ").len();
        core.desc.truncate(trimmed);
        Ok(Self { core, prefix })
    }

    /// Encoded scan prefix.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn qualified_row(&self, row: &[Value]) -> Qualified {
        if self.core.equalities_hold(row, self.core.hints.len()) {
            Qualified::Compatible
        } else {
            Qualified::Incompatible
        }
    }
}

/// Scans `[start, end)` built from the last hint's bounds.
#[derive(Clone, Debug)]
pub struct RangePath {
    core: PathCore,
    start: Vec<u8>,
    end: Vec<u8>,
}

impl RangePath {
    fn build(mut core: PathCore) -> Result<Self> {
        let last = core.hints.len() - 1;
        let mut common = key::index_prefix(PartitionId(0), core.index_id);
        for i in 0..last {
            core.encode_equality(i, &mut common)?;
        }
        let hint = core.hints[last].clone();
        let field = core.fields[last].clone();
        let offset = common.len();
        let rest = core.total_key_len - offset - field.encoded_len();

        let mut check_nullable = field.nullable;
        let mut start = common.clone();
        let mut end = common.clone();
        if let Some(value) = &hint.end {
            let (raw, bound) = encode_bound(&mut core, value, &field, offset, rest, false, hint.include_end)?;
            if !index_value::is_all_ones(&raw) {
                check_nullable = false;
            }
            end.extend_from_slice(&bound);
        } else {
            end.resize(core.total_key_len + 1, 0xFF);
        }
        if let Some(value) = &hint.begin {
            let (_, bound) = encode_bound(&mut core, value, &field, offset, rest, true, hint.include_begin)?;
            start.extend_from_slice(&bound);
        }
        if check_nullable {
            core.strategies.insert(Strategy::CheckNull {
                field: last,
                offset: core.nullable_offset,
                target_null: false,
            });
        }
        match field.ty {
            ColumnType::Float => core.strategies.insert(Strategy::CheckNaN { offset }),
            ColumnType::Geography => core.strategies.insert(Strategy::DedupGeoIndex {
                suffix_len: core.suffix_len,
            }),
            _ => {}
        }

        let left = match &hint.begin {
            Some(v) => format!("{}{}", if hint.include_begin { '[' } else { '(' }, v),
            None => "[-INF".to_string(),
        };
        let right = match &hint.end {
            Some(v) => format!("{}{}", v, if hint.include_end { ']' } else { ')' }),
            None => "INF]".to_string(),
        };
        let _ = write!(core.desc, "{}={},{}", hint.column, left, right);
        Ok(Self { core, start, end })
    }

    /// Inclusive start key.
    pub fn start(&self) -> &[u8] {
        &self.start
    }

    /// Exclusive end key.
    pub fn end(&self) -> &[u8] {
        &self.end
    }

    fn qualified_row(&self, row: &[Value]) -> Qualified {
        let last = self.core.hints.len() - 1;
        if !self.core.equalities_hold(row, last) {
            return Qualified::Incompatible;
        }
        if self.core.fields[last].ty == ColumnType::Geography {
            return Qualified::Compatible;
        }
        let hint = &self.core.hints[last];
        let value = &row[self.core.hint_cols[last]];
        if value.is_null() || matches!(value, Value::Float(f) if f.is_nan()) {
            return Qualified::Incompatible;
        }
        if let Some(begin) = &hint.begin {
            let ok = if hint.include_begin {
                begin <= value
            } else {
                begin < value
            };
            if !ok {
                return Qualified::Incompatible;
            }
        }
        if let Some(end) = &hint.end {
            let ok = if hint.include_end {
                value <= end
            } else {
                value < end
            };
            if !ok {
                return Qualified::Incompatible;
            }
        }
        Qualified::Compatible
    }
}

/// Encodes one bound of the ranged field. Returns the bare encoding and the
/// bytes to append to the common prefix.
fn encode_bound(
    core: &mut PathCore,
    value: &Value,
    field: &IndexField,
    offset: usize,
    rest: usize,
    lower: bool,
    include: bool,
) -> Result<(Vec<u8>, Vec<u8>)> {
    assert!(!value.is_null(), "range bounds cannot be NULL");
    // Lower bounds skip equal keys when exclusive; upper bounds keep them when inclusive.
    let mut greater = if lower { !include } else { include };
    let raw = encode_value(value, field.ty, field.len)?;
    match field.ty {
        ColumnType::String | ColumnType::FixedString(_) => {
            let truncated = index_value::is_full_string(&raw);
            if lower {
                greater &= !truncated;
            } else {
                greater |= truncated;
            }
            if truncated {
                core.strategies.insert(Strategy::CompareTruncated {
                    bound: raw.clone(),
                    offset,
                    lower,
                });
            }
        }
        ColumnType::Float => greater |= index_value::is_all_ones(&raw),
        _ => {}
    }
    let mut bound = raw.clone();
    if greater {
        bound.resize(raw.len() + rest + 1, 0xFF);
    }
    Ok((raw, bound))
}

fn normalise_hint(hint: &ColumnHint, ty: ColumnType) -> ColumnHint {
    let widen = |v: &Option<Value>| match (ty, v) {
        (ColumnType::Float, Some(Value::Int(i))) => Some(Value::Float(*i as f64)),
        _ => v.clone(),
    };
    ColumnHint {
        begin: widen(&hint.begin),
        end: widen(&hint.end),
        ..hint.clone()
    }
}

/// A built scan path.
#[derive(Clone, Debug)]
pub enum Path {
    /// Equality-only hints.
    Prefix(PrefixPath),
    /// Last hint is a range.
    Range(RangePath),
}

impl Path {
    /// Builds the path for `hints` over `index`.
    ///
    /// Hints must follow index-field order and only the last may be a range;
    /// both are contract violations that panic rather than return an error.
    pub fn make(
        index: &IndexDef,
        schema: &Schema,
        hints: &[ColumnHint],
        vid_len: usize,
    ) -> Result<Path> {
        let core = PathCore::new(index, schema, hints, vid_len)?;
        match hints.last() {
            Some(hint) if hint.scan_type == ScanType::Range => {
                Ok(Path::Range(RangePath::build(core)?))
            }
            _ => Ok(Path::Prefix(PrefixPath::build(core)?)),
        }
    }

    fn core(&self) -> &PathCore {
        match self {
            Path::Prefix(p) => &p.core,
            Path::Range(p) => &p.core,
        }
    }

    /// Qualifies a raw index key.
    pub fn qualified(&mut self, key: &[u8]) -> Qualified {
        match self {
            Path::Prefix(p) => p.core.strategies.qualify(key),
            Path::Range(p) => p.core.strategies.qualify(key),
        }
    }

    /// Qualifies a decoded base record laid out in schema order.
    pub fn qualified_row(&self, row: &[Value]) -> Qualified {
        match self {
            Path::Prefix(p) => p.qualified_row(row),
            Path::Range(p) => p.qualified_row(row),
        }
    }

    /// Rewrites the partition bytes of the scan keys.
    pub fn reset_part(&mut self, part: PartitionId) {
        match self {
            Path::Prefix(p) => key::replace_partition(&mut p.prefix, part),
            Path::Range(p) => {
                key::replace_partition(&mut p.start, part);
                key::replace_partition(&mut p.end, part);
            }
        }
    }

    /// Clears execution-scoped strategy state.
    pub fn reset_state(&mut self) {
        match self {
            Path::Prefix(p) => p.core.strategies.reset(),
            Path::Range(p) => p.core.strategies.reset(),
        }
    }

    /// Key bounds for the store.
    pub fn scan_range(&self) -> ScanRange<'_> {
        match self {
            Path::Prefix(p) => ScanRange::Prefix(&p.prefix),
            Path::Range(p) => ScanRange::Range(&p.start, &p.end),
        }
    }

    /// Human-readable hint summary, e.g. `a=1, b=[3,INF]`.
    pub fn describe(&self) -> &str {
        &self.core().desc
    }

    /// Normalised hints.
    pub fn hints(&self) -> &[ColumnHint] {
        &self.core().hints
    }

    /// Registered strategies.
    pub fn strategies(&self) -> &StrategySet {
        &self.core().strategies
    }

    /// Fixed key length of the index.
    pub fn total_key_len(&self) -> usize {
        self.core().total_key_len
    }

    /// Offset of the nullable bitmap.
    pub fn nullable_offset(&self) -> usize {
        self.core().nullable_offset
    }
}
