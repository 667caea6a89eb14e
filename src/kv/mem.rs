use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{KvIterator, KvStore};
use crate::error::{LookupError, Result};
use crate::types::{PartitionId, SpaceId};

type Part = BTreeMap<Vec<u8>, Vec<u8>>;

/// BTreeMap-backed store keyed by `(space, partition)`.
///
/// Iterators snapshot the matching entries, so readers never hold the lock
/// while a scan is being drained.
#[derive(Default)]
pub struct MemStore {
    parts: RwLock<FxHashMap<(SpaceId, PartitionId), Part>>,
    failing: RwLock<FxHashSet<(SpaceId, PartitionId)>>,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one entry.
    pub fn put(&self, space: SpaceId, part: PartitionId, key: Vec<u8>, value: Vec<u8>) {
        self.parts
            .write()
            .entry((space, part))
            .or_default()
            .insert(key, value);
    }

    /// Removes one entry, returning whether it existed.
    pub fn remove(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> bool {
        self.parts
            .write()
            .get_mut(&(space, part))
            .is_some_and(|entries| entries.remove(key).is_some())
    }

    /// Number of entries stored in a partition.
    pub fn len(&self, space: SpaceId, part: PartitionId) -> usize {
        self.parts
            .read()
            .get(&(space, part))
            .map_or(0, BTreeMap::len)
    }

    /// Makes every read of `part` fail with a storage error until cleared.
    pub fn set_failing(&self, space: SpaceId, part: PartitionId, failing: bool) {
        let mut set = self.failing.write();
        if failing {
            set.insert((space, part));
        } else {
            set.remove(&(space, part));
        }
    }

    fn check(&self, space: SpaceId, part: PartitionId) -> Result<()> {
        if self.failing.read().contains(&(space, part)) {
            return Err(LookupError::Store(format!("partition {part} unavailable")));
        }
        Ok(())
    }

    fn collect(
        &self,
        space: SpaceId,
        part: PartitionId,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        prefix: Option<&[u8]>,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let parts = self.parts.read();
        let Some(entries) = parts.get(&(space, part)) else {
            return Vec::new();
        };
        entries
            .range::<[u8], _>((lower, upper))
            .take_while(|(k, _)| prefix.map_or(true, |p| k.starts_with(p)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl KvStore for MemStore {
    fn range<'a>(
        &'a self,
        space: SpaceId,
        part: PartitionId,
        start: &[u8],
        end: &[u8],
    ) -> Result<Box<dyn KvIterator + 'a>> {
        self.check(space, part)?;
        if start >= end {
            return Ok(Box::new(SnapshotIter::new(Vec::new())));
        }
        let entries = self.collect(
            space,
            part,
            Bound::Included(start),
            Bound::Excluded(end),
            None,
        );
        Ok(Box::new(SnapshotIter::new(entries)))
    }

    fn prefix<'a>(
        &'a self,
        space: SpaceId,
        part: PartitionId,
        prefix: &[u8],
    ) -> Result<Box<dyn KvIterator + 'a>> {
        self.check(space, part)?;
        let entries = self.collect(
            space,
            part,
            Bound::Included(prefix),
            Bound::Unbounded,
            Some(prefix),
        );
        Ok(Box::new(SnapshotIter::new(entries)))
    }

    fn get(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check(space, part)?;
        Ok(self
            .parts
            .read()
            .get(&(space, part))
            .and_then(|entries| entries.get(key).cloned()))
    }
}

struct SnapshotIter {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

impl SnapshotIter {
    fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { entries, pos: 0 }
    }
}

impl KvIterator for SnapshotIter {
    fn valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn next(&mut self) {
        self.pos += 1;
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos].1
    }
}
