//! Index scans: hint encoding, key qualification and the scan node.

pub mod node;
pub mod path;
pub mod strategy;

pub use node::IndexScanPlan;
pub use path::{ColumnHint, Path, PrefixPath, RangePath, ScanRange, ScanType};
pub use strategy::{Qualified, Strategy, StrategySet};
