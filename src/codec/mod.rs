//! Byte codecs for index keys, index field values and base records.

pub mod geo;
pub mod index_value;
pub mod key;
pub mod row;
