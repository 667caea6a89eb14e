//! Request orchestration: plan building and per-partition execution.

mod processor;
mod request;
mod response;

pub use processor::LookupProcessor;
pub use request::{IndexQueryContext, LookupRequest};
pub use response::{DataSet, LookupResponse, PartitionResult};
