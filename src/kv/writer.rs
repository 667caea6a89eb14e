use std::sync::Arc;

use smallvec::{smallvec, SmallVec};
use tracing::trace;

use super::MemStore;
use crate::codec::{geo, index_value, key, row};
use crate::error::{LookupError, Result};
use crate::meta::{ColumnType, IndexDef, IndexTarget, MetaCatalog, Schema};
use crate::types::{EdgeRanking, EdgeType, PartitionId, SpaceId, TagId};
use crate::value::Value;

/// Writes base records together with every index entry derived from them,
/// producing exactly the key layout the scan nodes read.
pub struct IndexWriter {
    store: Arc<MemStore>,
    catalog: Arc<dyn MetaCatalog>,
    vid_len: usize,
}

impl IndexWriter {
    /// Creates a writer over `store` using `catalog` to find schemas and indexes.
    pub fn new(store: Arc<MemStore>, catalog: Arc<dyn MetaCatalog>, vid_len: usize) -> Self {
        Self {
            store,
            catalog,
            vid_len,
        }
    }

    /// Stores a vertex tag and its index entries.
    pub fn insert_vertex(
        &self,
        space: SpaceId,
        part: PartitionId,
        vid: &str,
        tag: TagId,
        values: Vec<Value>,
    ) -> Result<()> {
        let schema = self.catalog.tag_schema(space, tag)?;
        let vid = key::pad_vid(vid.as_bytes(), self.vid_len)?;
        let record = row::encode_row(&schema, &values)?;
        self.store
            .put(space, part, key::vertex_key(part, &vid, tag), record);
        for index in self.catalog.indexes_on(space, IndexTarget::Tag(tag))? {
            let ttl = ttl_value(&schema, &values);
            for fields in index_fields(&index, &schema, &values)? {
                let entry = key::vertex_index_key(
                    part,
                    index.id,
                    &fields.bytes,
                    fields.bitmap,
                    &vid,
                );
                trace!(index = %index.id, key = %hex::encode(&entry), "index entry written");
                self.store.put(space, part, entry, ttl.clone());
            }
        }
        Ok(())
    }

    /// Stores an edge and its index entries.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_edge(
        &self,
        space: SpaceId,
        part: PartitionId,
        src: &str,
        edge: EdgeType,
        rank: EdgeRanking,
        dst: &str,
        values: Vec<Value>,
    ) -> Result<()> {
        let schema = self.catalog.edge_schema(space, edge)?;
        let src = key::pad_vid(src.as_bytes(), self.vid_len)?;
        let dst = key::pad_vid(dst.as_bytes(), self.vid_len)?;
        let record = row::encode_row(&schema, &values)?;
        self.store
            .put(space, part, key::edge_key(part, &src, edge, rank, &dst), record);
        for index in self.catalog.indexes_on(space, IndexTarget::Edge(edge))? {
            let ttl = ttl_value(&schema, &values);
            for fields in index_fields(&index, &schema, &values)? {
                let entry = key::edge_index_key(
                    part,
                    index.id,
                    &fields.bytes,
                    fields.bitmap,
                    &src,
                    rank,
                    &dst,
                );
                self.store.put(space, part, entry, ttl.clone());
            }
        }
        Ok(())
    }
}

struct EncodedFields {
    bytes: Vec<u8>,
    bitmap: Option<[u8; key::NULL_BITMAP_LEN]>,
}

/// Encoded field sections for one row; geography fields fan out to one
/// section per covering cell.
fn index_fields(index: &IndexDef, schema: &Schema, values: &[Value]) -> Result<Vec<EncodedFields>> {
    index.validate()?;
    let mut sections: Vec<Vec<u8>> = vec![Vec::with_capacity(index.fields_len())];
    let mut nulls = Vec::with_capacity(index.fields.len());
    for field in &index.fields {
        let (pos, _) = schema
            .field(&field.name)
            .ok_or_else(|| LookupError::FieldNotFound(field.name.clone()))?;
        let value = &values[pos];
        nulls.push(value.is_null());
        let encodings: SmallVec<[Vec<u8>; 4]> = match (field.ty, value) {
            (_, Value::Null) => smallvec![index_value::encode_null(field.ty, field.len)],
            (ColumnType::Geography, Value::Geography(point)) => geo::covering(point)
                .into_iter()
                .map(|cell| geo::cell_key(cell).to_vec())
                .collect(),
            (ty, v) => smallvec![index_value::encode_value(v, ty, field.len)?],
        };
        let mut next = Vec::with_capacity(sections.len() * encodings.len());
        for section in &sections {
            for encoded in &encodings {
                let mut grown = section.clone();
                grown.extend_from_slice(encoded);
                next.push(grown);
            }
        }
        sections = next;
    }
    let bitmap = index.has_nullable().then(|| key::null_bitmap(&nulls));
    Ok(sections
        .into_iter()
        .map(|bytes| EncodedFields { bytes, bitmap })
        .collect())
}

fn ttl_value(schema: &Schema, values: &[Value]) -> Vec<u8> {
    let Some(ttl) = &schema.ttl else {
        return Vec::new();
    };
    match schema.field(&ttl.column).map(|(pos, _)| &values[pos]) {
        Some(Value::Int(ts)) => key::ttl_index_value(*ts),
        _ => Vec::new(),
    }
}
