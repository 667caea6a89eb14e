//! Identifier newtypes and reserved column names shared by the lookup engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Graph space identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct SpaceId(pub u32);
/// Partition identifier; only the low 24 bits are representable in a key.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct PartitionId(pub u32);
/// Index identifier assigned by the metadata catalog.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct IndexId(pub u32);
/// Vertex tag identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct TagId(pub u32);
/// Edge type identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct EdgeType(pub u32);

/// Edge ranking; part of the edge identity together with src, type and dst.
pub type EdgeRanking = i64;

/// Largest partition id that fits in the three partition bytes of a key.
pub const MAX_PARTITION_ID: u32 = (1 << 24) - 1;

/// Reserved column carrying the vertex id of a vertex index entry.
pub const VID: &str = "_vid";
/// Reserved column carrying the tag id of a vertex index entry.
pub const TAG: &str = "_tag";
/// Reserved column carrying the source vertex id of an edge index entry.
pub const SRC: &str = "_src";
/// Reserved column carrying the edge type of an edge index entry.
pub const TYPE: &str = "_type";
/// Reserved column carrying the ranking of an edge index entry.
pub const RANK: &str = "_rank";
/// Reserved column carrying the destination vertex id of an edge index entry.
pub const DST: &str = "_dst";

/// Returns true when `name` is one of the reserved identity columns.
pub fn is_reserved_column(name: &str) -> bool {
    matches!(name, VID | TAG | SRC | TYPE | RANK | DST)
}

macro_rules! id_display_and_from {
    ($($ty:ident),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<u32> for $ty {
                fn from(value: u32) -> Self {
                    $ty(value)
                }
            }

            impl From<$ty> for u32 {
                fn from(value: $ty) -> Self {
                    value.0
                }
            }
        )*
    };
}

id_display_and_from!(SpaceId, PartitionId, IndexId, TagId, EdgeType);
