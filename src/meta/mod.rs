//! Schema and index metadata borrowed by the engine for one request.

mod catalog;
mod index;
mod schema;

pub use catalog::{MemCatalog, MetaCatalog};
pub use index::{IndexDef, IndexField, IndexTarget};
pub use schema::{ColumnDef, ColumnType, Schema, TtlSpec};
