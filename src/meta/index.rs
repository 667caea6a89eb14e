use serde::{Deserialize, Serialize};

use super::ColumnType;
use crate::codec::{index_value, key};
use crate::error::{LookupError, Result};
use crate::types::{EdgeType, IndexId, TagId};

/// Schema an index is defined over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexTarget {
    /// Vertex tag index.
    Tag(TagId),
    /// Edge type index.
    Edge(EdgeType),
}

/// One indexed field, in index order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    /// Schema column name.
    pub name: String,
    /// Declared type inside the index.
    pub ty: ColumnType,
    /// Encoded width for string fields; strings are padded or truncated to it.
    pub len: Option<u16>,
    /// Whether the field may be NULL.
    pub nullable: bool,
}

impl IndexField {
    /// Fixed-width, non-nullable field.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            len: None,
            nullable: false,
        }
    }

    /// String field truncated to `len` bytes.
    pub fn string(name: impl Into<String>, len: u16) -> Self {
        Self {
            len: Some(len),
            ..Self::new(name, ColumnType::String)
        }
    }

    /// Marks the field nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Encoded width of the field in an index key.
    pub fn encoded_len(&self) -> usize {
        index_value::encoded_len(self.ty, self.len)
    }
}

/// Index definition as stored by the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index identifier.
    pub id: IndexId,
    /// Human-readable name.
    pub name: String,
    /// Indexed schema.
    pub target: IndexTarget,
    /// Indexed fields in key order.
    pub fields: Vec<IndexField>,
}

impl IndexDef {
    /// Builds a definition.
    pub fn new(
        id: IndexId,
        name: impl Into<String>,
        target: IndexTarget,
        fields: Vec<IndexField>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            target,
            fields,
        }
    }

    /// True when any field is nullable; such keys carry a two-byte null bitmap.
    pub fn has_nullable(&self) -> bool {
        self.fields.iter().any(|f| f.nullable)
    }

    /// Sum of the encoded field widths.
    pub fn fields_len(&self) -> usize {
        self.fields.iter().map(IndexField::encoded_len).sum()
    }

    /// Position of a field by name.
    pub fn field_pos(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Rejects definitions the key layout cannot express: a nullable index
    /// carries one bitmap bit per field, so it holds at most
    /// [`key::MAX_NULLABLE_FIELDS`] fields.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(LookupError::invalid(format!("index {} has no fields", self.id)));
        }
        if self.has_nullable() && self.fields.len() > key::MAX_NULLABLE_FIELDS {
            return Err(LookupError::invalid(format!(
                "nullable index {} has {} fields, at most {} fit the null bitmap",
                self.id,
                self.fields.len(),
                key::MAX_NULLABLE_FIELDS
            )));
        }
        Ok(())
    }

    /// Whether the index covers an edge type.
    pub fn is_edge(&self) -> bool {
        matches!(self.target, IndexTarget::Edge(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_len_sums_widths() {
        let def = IndexDef::new(
            IndexId(1),
            "person_age_name",
            IndexTarget::Tag(TagId(2)),
            vec![
                IndexField::new("age", ColumnType::Int),
                IndexField::string("name", 8).nullable(),
            ],
        );
        assert_eq!(def.fields_len(), 16);
        assert!(def.has_nullable());
        assert_eq!(def.field_pos("name"), Some(1));
        assert!(!def.is_edge());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn wide_nullable_index_is_rejected() {
        let wide = |nullable: bool| {
            let fields = (0..17)
                .map(|i| {
                    let field = IndexField::new(format!("f{i}"), ColumnType::Int);
                    if nullable && i == 16 {
                        field.nullable()
                    } else {
                        field
                    }
                })
                .collect();
            IndexDef::new(IndexId(4), "wide", IndexTarget::Tag(TagId(1)), fields)
        };
        assert!(wide(false).validate().is_ok());
        assert!(matches!(
            wide(true).validate(),
            Err(LookupError::InvalidRequest(_))
        ));
    }
}
