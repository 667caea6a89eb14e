#![allow(missing_docs)]

use std::fmt;
use std::io;

use thiserror::Error;
use tracing::error;

use crate::types::{EdgeType, IndexId, TagId};

/// Result alias used across the lookup engine.
pub type Result<T> = std::result::Result<T, LookupError>;

/// Errors surfaced while planning or executing an index lookup.
///
/// Metadata failures abort the request before any partition runs; storage
/// failures and cancellation are recorded against the partition that hit them.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("index {0} not found")]
    IndexNotFound(IndexId),
    #[error("tag {0} not found")]
    TagNotFound(TagId),
    #[error("edge type {0} not found")]
    EdgeNotFound(EdgeType),
    #[error("field '{0}' not found")]
    FieldNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid field value: {0}")]
    InvalidFieldValue(String),
    #[error("base record missing for index key {0}")]
    BaseNotFound(String),
    #[error("storage error: {0}")]
    Store(String),
    #[error("corruption detected: {0}")]
    Corruption(&'static str),
    #[error("plan killed")]
    PlanKilled,
    #[error("worker pool error: {0}")]
    WorkerPool(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl LookupError {
    /// Builds an [`LookupError::InvalidRequest`] from anything displayable.
    pub fn invalid(msg: impl Into<String>) -> Self {
        LookupError::InvalidRequest(msg.into())
    }

    /// Maps the error to the per-partition result code reported to callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            LookupError::IndexNotFound(_) => ErrorCode::IndexNotFound,
            LookupError::TagNotFound(_) => ErrorCode::TagNotFound,
            LookupError::EdgeNotFound(_) => ErrorCode::EdgeNotFound,
            LookupError::FieldNotFound(_) => ErrorCode::FieldNotFound,
            LookupError::InvalidRequest(_) | LookupError::Config(_) => ErrorCode::InvalidRequest,
            LookupError::InvalidFieldValue(_) => ErrorCode::InvalidFieldValue,
            LookupError::BaseNotFound(_) => ErrorCode::KeyNotFound,
            LookupError::Store(_) | LookupError::Io(_) => ErrorCode::StoreFailure,
            LookupError::Corruption(_) => ErrorCode::Corruption,
            LookupError::PlanKilled => ErrorCode::PlanKilled,
            LookupError::WorkerPool(_) => ErrorCode::Unknown,
        }
    }
}

/// Result code recorded for every requested partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    Succeeded,
    IndexNotFound,
    TagNotFound,
    EdgeNotFound,
    FieldNotFound,
    InvalidRequest,
    InvalidFieldValue,
    KeyNotFound,
    StoreFailure,
    Corruption,
    PlanKilled,
    Unknown,
}

impl ErrorCode {
    /// Returns true for [`ErrorCode::Succeeded`].
    pub fn is_ok(self) -> bool {
        self == ErrorCode::Succeeded
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Logs and converts a base-record miss that the caller asked to treat as fatal.
pub(crate) fn fatal_base_not_found(key: &[u8]) -> LookupError {
    let key_hex = hex::encode(key);
    error!(key = %key_hex, "base record not found for index key");
    LookupError::BaseNotFound(key_hex)
}
