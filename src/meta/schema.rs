use serde::{Deserialize, Serialize};

/// Declared type of a schema column or index field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Variable-length string.
    String,
    /// String stored with a fixed width.
    FixedString(u16),
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    DateTime,
    /// Geography point.
    Geography,
}

impl ColumnType {
    /// Returns true for both string flavours.
    pub fn is_string(self) -> bool {
        matches!(self, ColumnType::String | ColumnType::FixedString(_))
    }
}

/// One column of a tag or edge schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub ty: ColumnType,
    /// Whether NULL may be stored.
    pub nullable: bool,
}

impl ColumnDef {
    /// Non-nullable column.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
        }
    }

    /// Nullable column.
    pub fn nullable(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, ty)
        }
    }
}

/// Time-to-live policy: rows expire `duration` seconds after the value of `column`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlSpec {
    /// Int column holding a timestamp in seconds.
    pub column: String,
    /// Lifetime in seconds.
    pub duration: i64,
}

/// Column layout of a vertex tag or an edge type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Columns in storage order.
    pub columns: Vec<ColumnDef>,
    /// Optional TTL policy.
    pub ttl: Option<TtlSpec>,
}

impl Schema {
    /// Schema without TTL.
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns, ttl: None }
    }

    /// Adds a TTL policy.
    pub fn with_ttl(mut self, column: impl Into<String>, duration: i64) -> Self {
        self.ttl = Some(TtlSpec {
            column: column.into(),
            duration,
        });
        self
    }

    /// Finds a column and its position.
    pub fn field(&self, name: &str) -> Option<(usize, &ColumnDef)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, col)| col.name == name)
    }
}
