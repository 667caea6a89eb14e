//! Lookup request shape: index contexts, output columns and the row window.

use serde::{Deserialize, Serialize};

use crate::exec::{Expr, OrderBy, StatProp};
use crate::meta::IndexTarget;
use crate::scan::ColumnHint;
use crate::types::{IndexId, PartitionId, SpaceId};

/// One index to scan and the hints that drive it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexQueryContext {
    /// Index to scan.
    pub index_id: IndexId,
    /// Hints in index-field order; only the last may be a range.
    pub hints: Vec<ColumnHint>,
    /// Optional filter applied to scanned rows.
    pub filter: Option<Expr>,
}

impl IndexQueryContext {
    /// Scans `index_id` with `hints` and no filter.
    pub fn new(index_id: IndexId, hints: Vec<ColumnHint>) -> Self {
        Self {
            index_id,
            hints,
            filter: None,
        }
    }

    /// Adds a post-scan filter.
    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// An index lookup over a set of partitions.
///
/// Several contexts are unioned with duplicate removal, which is how a
/// disjunction over differently-indexed constraints is expressed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    /// Graph space.
    pub space: SpaceId,
    /// Partitions to scan.
    pub parts: Vec<PartitionId>,
    /// Tag or edge type the indexes are defined over.
    pub target: IndexTarget,
    /// One scan per context.
    pub contexts: Vec<IndexQueryContext>,
    /// Output columns, in order.
    pub return_columns: Vec<String>,
    /// Maximum rows per partition.
    pub limit: Option<u64>,
    /// Rows skipped per partition before `limit` applies; needs `limit`.
    #[serde(default)]
    pub offset: u64,
    /// Ordering applied within each partition; needs `limit`.
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    /// Statistics folded over the returned rows.
    #[serde(default)]
    pub stat_columns: Vec<StatProp>,
}

impl LookupRequest {
    /// Request with one context and no limit, order or statistics.
    pub fn new(
        space: SpaceId,
        parts: Vec<PartitionId>,
        target: IndexTarget,
        context: IndexQueryContext,
        return_columns: Vec<String>,
    ) -> Self {
        Self {
            space,
            parts,
            target,
            contexts: vec![context],
            return_columns,
            limit: None,
            offset: 0,
            order_by: Vec::new(),
            stat_columns: Vec::new(),
        }
    }

    /// Adds another context to union with the others.
    pub fn or_context(mut self, context: IndexQueryContext) -> Self {
        self.contexts.push(context);
        self
    }

    /// Caps the rows returned per partition.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` rows of each partition.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Orders rows within each partition.
    pub fn with_order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    /// Requests statistics.
    pub fn with_stats(mut self, stats: Vec<StatProp>) -> Self {
        self.stat_columns = stats;
        self
    }
}
