//! Index scan execution engine for a partitioned graph store.
//!
//! A lookup request names one or more indexes together with per-field
//! column hints. The engine turns those hints into byte ranges over the
//! ordered key-value store, qualifies every candidate key, falls back to the
//! base record when the index alone cannot answer, and composes the rows
//! through a small pull-based operator tree executed once per partition.

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod exec;
pub mod kv;
pub mod lookup;
pub mod meta;
pub mod primitives;
pub mod profile;
pub mod scan;
pub mod types;
pub mod value;

pub use config::LookupConfig;
pub use error::{ErrorCode, LookupError, Result};
pub use lookup::{LookupProcessor, LookupRequest, LookupResponse};
pub use value::Value;
