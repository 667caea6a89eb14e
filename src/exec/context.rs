//! Init-time column handshake and per-request runtime handles.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

use crate::error::{LookupError, Result};
use crate::kv::KvStore;
use crate::types::SpaceId;

/// Column handshake negotiated once by `PlanNode::init`.
///
/// A parent fills `required_columns` before initialising its child; the
/// child answers with the columns it produces and their positions.
#[derive(Clone, Debug, Default)]
pub struct InitContext {
    /// Columns the parent needs from the child.
    pub required_columns: BTreeSet<String>,
    /// Columns produced, in row order.
    pub return_columns: Vec<String>,
    /// Position of every produced column.
    pub ret_col_map: FxHashMap<String, usize>,
}

impl InitContext {
    /// Context requiring `columns`.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Records the produced columns and rebuilds the position map.
    pub fn set_return_columns(&mut self, columns: Vec<String>) {
        self.ret_col_map = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        self.return_columns = columns;
    }

    /// Position of a produced column.
    pub fn position(&self, column: &str) -> Result<usize> {
        self.ret_col_map
            .get(column)
            .copied()
            .ok_or_else(|| LookupError::FieldNotFound(column.to_string()))
    }
}

/// Per-request handles borrowed by every execution node.
#[derive(Clone, Copy)]
pub struct RuntimeContext<'a> {
    /// Space being scanned.
    pub space: SpaceId,
    /// Store to read from.
    pub store: &'a dyn KvStore,
    /// Request-scoped cancellation flag.
    pub killed: &'a AtomicBool,
    /// Seconds since the Unix epoch, used for TTL expiry.
    pub now: i64,
    /// Fail instead of skipping when a base record is missing.
    pub fatal_on_base_not_found: bool,
}

impl RuntimeContext<'_> {
    /// True once the request has been killed.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Relaxed)
    }
}
