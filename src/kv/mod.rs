//! Ordered key-value store interface consumed by the scan nodes.
//!
//! The engine only reads. [`MemStore`] and [`IndexWriter`] exist so the
//! engine can be embedded and exercised without the replicated store.

mod mem;
mod writer;

pub use mem::MemStore;
pub use writer::IndexWriter;

use crate::error::Result;
use crate::types::{PartitionId, SpaceId};

/// Cursor over an ordered run of entries.
pub trait KvIterator {
    /// True while the cursor points at an entry.
    fn valid(&self) -> bool;
    /// Advances to the next entry.
    fn next(&mut self);
    /// Key of the current entry.
    fn key(&self) -> &[u8];
    /// Value of the current entry.
    fn value(&self) -> &[u8];
}

/// Read access to one graph space's partitions.
///
/// Implementations must allow concurrent reads from several partitions.
pub trait KvStore: Send + Sync {
    /// Entries with `start <= key < end`.
    fn range<'a>(
        &'a self,
        space: SpaceId,
        part: PartitionId,
        start: &[u8],
        end: &[u8],
    ) -> Result<Box<dyn KvIterator + 'a>>;

    /// Entries whose key starts with `prefix`.
    fn prefix<'a>(
        &'a self,
        space: SpaceId,
        part: PartitionId,
        prefix: &[u8],
    ) -> Result<Box<dyn KvIterator + 'a>>;

    /// Point lookup; `Ok(None)` when the key is absent.
    fn get(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> Result<Option<Vec<u8>>>;
}
