use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{IndexDef, IndexTarget, Schema};
use crate::error::{LookupError, Result};
use crate::types::{EdgeType, IndexId, SpaceId, TagId};

/// Resolves index definitions and schemas for a request.
pub trait MetaCatalog: Send + Sync {
    /// Looks up an index definition by id.
    fn index(&self, space: SpaceId, id: IndexId) -> Result<Arc<IndexDef>>;
    /// Looks up the latest schema of a vertex tag.
    fn tag_schema(&self, space: SpaceId, tag: TagId) -> Result<Arc<Schema>>;
    /// Looks up the latest schema of an edge type.
    fn edge_schema(&self, space: SpaceId, edge: EdgeType) -> Result<Arc<Schema>>;
    /// Every index defined over `target`, ordered by index id.
    fn indexes_on(&self, space: SpaceId, target: IndexTarget) -> Result<Vec<Arc<IndexDef>>>;
}

#[derive(Default)]
struct CatalogMaps {
    indexes: FxHashMap<(SpaceId, IndexId), Arc<IndexDef>>,
    tags: FxHashMap<(SpaceId, TagId), Arc<Schema>>,
    edges: FxHashMap<(SpaceId, EdgeType), Arc<Schema>>,
}

/// In-memory catalog for embedding and tests.
#[derive(Default)]
pub struct MemCatalog {
    maps: RwLock<CatalogMaps>,
}

impl MemCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tag schema.
    pub fn with_tag(self, space: SpaceId, tag: TagId, schema: Schema) -> Self {
        self.add_tag(space, tag, schema);
        self
    }

    /// Registers an edge schema.
    pub fn with_edge(self, space: SpaceId, edge: EdgeType, schema: Schema) -> Self {
        self.add_edge(space, edge, schema);
        self
    }

    /// Registers an index definition.
    pub fn with_index(self, space: SpaceId, def: IndexDef) -> Self {
        self.add_index(space, def);
        self
    }

    /// Registers or replaces a tag schema.
    pub fn add_tag(&self, space: SpaceId, tag: TagId, schema: Schema) {
        self.maps.write().tags.insert((space, tag), Arc::new(schema));
    }

    /// Registers or replaces an edge schema.
    pub fn add_edge(&self, space: SpaceId, edge: EdgeType, schema: Schema) {
        self.maps.write().edges.insert((space, edge), Arc::new(schema));
    }

    /// Registers or replaces an index definition.
    pub fn add_index(&self, space: SpaceId, def: IndexDef) {
        self.maps.write().indexes.insert((space, def.id), Arc::new(def));
    }
}

impl MetaCatalog for MemCatalog {
    fn index(&self, space: SpaceId, id: IndexId) -> Result<Arc<IndexDef>> {
        self.maps
            .read()
            .indexes
            .get(&(space, id))
            .cloned()
            .ok_or(LookupError::IndexNotFound(id))
    }

    fn tag_schema(&self, space: SpaceId, tag: TagId) -> Result<Arc<Schema>> {
        self.maps
            .read()
            .tags
            .get(&(space, tag))
            .cloned()
            .ok_or(LookupError::TagNotFound(tag))
    }

    fn edge_schema(&self, space: SpaceId, edge: EdgeType) -> Result<Arc<Schema>> {
        self.maps
            .read()
            .edges
            .get(&(space, edge))
            .cloned()
            .ok_or(LookupError::EdgeNotFound(edge))
    }

    fn indexes_on(&self, space: SpaceId, target: IndexTarget) -> Result<Vec<Arc<IndexDef>>> {
        let maps = self.maps.read();
        let mut found: Vec<Arc<IndexDef>> = maps
            .indexes
            .iter()
            .filter(|((s, _), def)| *s == space && def.target == target)
            .map(|(_, def)| Arc::clone(def))
            .collect();
        found.sort_by_key(|def| def.id);
        Ok(found)
    }
}
