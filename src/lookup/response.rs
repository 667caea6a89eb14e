//! Merged rows, per-partition result codes and statistics.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::types::PartitionId;
use crate::value::{Row, Value};

/// Column-oriented result table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    /// Column names.
    pub columns: Vec<String>,
    /// Rows, each with one value per column.
    pub rows: Vec<Row>,
}

impl DataSet {
    /// Empty table with `columns`.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Values of one column.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let pos = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| &r[pos]).collect())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no row was produced.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of one requested partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResult {
    /// Partition.
    pub part: PartitionId,
    /// Result code.
    pub code: ErrorCode,
    /// Error text for failed partitions.
    pub message: Option<String>,
}

/// Merged rows plus one result per requested partition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    /// Rows from every successful partition.
    pub data: DataSet,
    /// One entry per requested partition, in request order.
    pub results: Vec<PartitionResult>,
    /// Merged statistics, one row, when statistics were requested.
    pub stats: Option<DataSet>,
}

impl LookupResponse {
    /// True when every partition succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.code.is_ok())
    }

    /// Partitions that failed.
    pub fn failed_parts(&self) -> Vec<PartitionId> {
        self.results
            .iter()
            .filter(|r| !r.code.is_ok())
            .map(|r| r.part)
            .collect()
    }
}
