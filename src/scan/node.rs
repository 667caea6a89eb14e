//! Index scan plan and its per-partition execution state.
//!
//! The plan decides once, at init, whether the requested columns can be
//! answered from index keys alone. Execution then walks the key range of
//! one partition, qualifies every key, and either decodes the row from the
//! key or fetches the base record it points to.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::path::{Path, ScanRange};
use super::strategy::Qualified;
use super::ColumnHint;
use crate::codec::{index_value, key, row};
use crate::error::{fatal_base_not_found, LookupError, Result};
use crate::exec::{BoxExecNode, ExecNode, InitContext, PlanNode, RuntimeContext};
use crate::kv::KvIterator;
use crate::meta::{ColumnType, IndexDef, IndexTarget, Schema};
use crate::profile::{profile_timer, record_profile_timer, LookupProfileKind};
use crate::types::{self, PartitionId};
use crate::value::{Row, Value};

/// Where one output column comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    Vid,
    Tag,
    Src,
    Type,
    Rank,
    Dst,
    /// Field `field` of the index key, starting at `offset`.
    Key { field: usize, offset: usize },
    /// Column `pos` of the decoded base record.
    Base(usize),
}

/// Read-only description of one index scan.
#[derive(Clone, Debug)]
pub struct IndexScanPlan {
    index: Arc<IndexDef>,
    schema: Arc<Schema>,
    path: Path,
    vid_len: usize,
    columns: Vec<String>,
    need_access_base: bool,
    key_sources: Vec<Source>,
    base_sources: Vec<Source>,
}

impl IndexScanPlan {
    /// Builds the path for `hints` over `index`.
    pub fn new(
        index: Arc<IndexDef>,
        schema: Arc<Schema>,
        hints: Vec<ColumnHint>,
        vid_len: usize,
    ) -> Result<Self> {
        let path = Path::make(&index, &schema, &hints, vid_len)?;
        Ok(Self {
            index,
            schema,
            path,
            vid_len,
            columns: Vec::new(),
            need_access_base: false,
            key_sources: Vec::new(),
            base_sources: Vec::new(),
        })
    }

    /// Wraps the plan in the node variant matching the index target.
    pub fn into_node(self) -> PlanNode {
        match self.index.target {
            IndexTarget::Tag(_) => PlanNode::VertexScan(self),
            IndexTarget::Edge(_) => PlanNode::EdgeScan(self),
        }
    }

    /// The scan path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether base records must be read; fixed at init.
    pub fn need_access_base(&self) -> bool {
        self.need_access_base
    }

    /// `IndexID=.., Path=(..)`.
    pub fn describe(&self) -> String {
        format!("IndexID={}, Path=({})", self.index.id, self.path.describe())
    }

    pub(crate) fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        let columns: Vec<String> = ctx.required_columns.iter().cloned().collect();
        let mut key_sources = Vec::with_capacity(columns.len());
        let mut base_sources = Vec::with_capacity(columns.len());
        let mut need_access_base = false;
        for column in &columns {
            if let Some(source) = self.reserved_source(column) {
                key_sources.push(source);
                base_sources.push(source);
                continue;
            }
            let (pos, def) = self
                .schema
                .field(column)
                .ok_or_else(|| LookupError::FieldNotFound(column.clone()))?;
            base_sources.push(Source::Base(pos));
            match self.key_source(column, def.ty) {
                Some(source) => key_sources.push(source),
                None => need_access_base = true,
            }
        }
        self.columns = columns.clone();
        self.need_access_base = need_access_base;
        self.key_sources = key_sources;
        self.base_sources = base_sources;
        debug!(
            index = %self.index.id,
            path = %self.path.describe(),
            need_access_base,
            dedup_geo = self.path.strategies().dedups_geo(),
            "index scan plan initialised"
        );
        ctx.set_return_columns(columns);
        Ok(())
    }

    fn reserved_source(&self, column: &str) -> Option<Source> {
        match (self.index.target, column) {
            (IndexTarget::Tag(_), types::VID) => Some(Source::Vid),
            (IndexTarget::Tag(_), types::TAG) => Some(Source::Tag),
            (IndexTarget::Edge(_), types::SRC) => Some(Source::Src),
            (IndexTarget::Edge(_), types::TYPE) => Some(Source::Type),
            (IndexTarget::Edge(_), types::RANK) => Some(Source::Rank),
            (IndexTarget::Edge(_), types::DST) => Some(Source::Dst),
            _ => None,
        }
    }

    /// Key position of `column` when the index alone can answer it. Strings
    /// qualify only when the schema bounds them within the index width.
    fn key_source(&self, column: &str, schema_ty: ColumnType) -> Option<Source> {
        let mut offset = key::INDEX_PREFIX_LEN;
        for (i, field) in self.index.fields.iter().enumerate() {
            if field.name == column {
                let answerable = match (field.ty, schema_ty) {
                    (ColumnType::Geography, _) => false,
                    (ty, ColumnType::FixedString(n)) if ty.is_string() => {
                        n as usize <= field.encoded_len()
                    }
                    (ty, _) => !ty.is_string(),
                };
                return answerable.then_some(Source::Key { field: i, offset });
            }
            offset += field.encoded_len();
        }
        None
    }

    pub(crate) fn instantiate<'a>(&'a self, rt: &RuntimeContext<'a>) -> BoxExecNode<'a> {
        Box::new(IndexScanExec {
            plan: self,
            rt: *rt,
            path: self.path.clone(),
            iter: None,
            part: PartitionId(0),
        })
    }

    fn reserved_value(&self, source: Source, key: &[u8]) -> Value {
        match source {
            Source::Vid => key::vid_value(key::index_vertex_id(key, self.vid_len)),
            Source::Tag | Source::Type => match self.index.target {
                IndexTarget::Tag(tag) => Value::Int(i64::from(tag.0)),
                IndexTarget::Edge(edge) => Value::Int(i64::from(edge.0)),
            },
            Source::Src => key::vid_value(key::index_edge_id(key, self.vid_len).0),
            Source::Rank => Value::Int(key::index_edge_id(key, self.vid_len).1),
            Source::Dst => key::vid_value(key::index_edge_id(key, self.vid_len).2),
            Source::Key { .. } | Source::Base(_) => Value::Null,
        }
    }

    /// Decodes the output row straight from an index key.
    fn key_row(&self, key: &[u8]) -> Result<Row> {
        let nullable_offset = self.path.nullable_offset();
        self.key_sources
            .iter()
            .map(|source| match *source {
                Source::Key { field, offset } => {
                    let def = &self.index.fields[field];
                    if def.nullable && key::is_null_at(key, nullable_offset, field) {
                        return Ok(Value::Null);
                    }
                    let raw = &key[offset..offset + def.encoded_len()];
                    index_value::decode_value(raw, def.ty, def.len)
                }
                other => Ok(self.reserved_value(other, key)),
            })
            .collect()
    }

    /// Projects a decoded base record onto the output columns.
    fn base_row(&self, key: &[u8], record: &[Value]) -> Row {
        self.base_sources
            .iter()
            .map(|source| match *source {
                Source::Base(pos) => record.get(pos).cloned().unwrap_or(Value::Null),
                other => self.reserved_value(other, key),
            })
            .collect()
    }

    /// Base-record key the index key points to.
    fn base_key(&self, part: PartitionId, key: &[u8]) -> Vec<u8> {
        match self.index.target {
            IndexTarget::Tag(tag) => key::vertex_key(part, key::index_vertex_id(key, self.vid_len), tag),
            IndexTarget::Edge(edge) => {
                let (src, rank, dst) = key::index_edge_id(key, self.vid_len);
                key::edge_key(part, src, edge, rank, dst)
            }
        }
    }

    fn expired(&self, value: &[u8], now: i64) -> bool {
        let Some(ttl) = &self.schema.ttl else {
            return false;
        };
        key::index_value_ttl(value).is_some_and(|ts| ts.saturating_add(ttl.duration) < now)
    }
}

/// Mutable state of one partition run over an [`IndexScanPlan`].
struct IndexScanExec<'a> {
    plan: &'a IndexScanPlan,
    rt: RuntimeContext<'a>,
    path: Path,
    iter: Option<Box<dyn KvIterator + 'a>>,
    part: PartitionId,
}

impl IndexScanExec<'_> {
    /// Fetches and qualifies the base record behind `key`. `Ok(None)` skips
    /// the entry.
    fn from_base(&mut self, key: &[u8], verdict: Qualified) -> Result<Option<Row>> {
        let base_key = self.plan.base_key(self.part, key);
        let timer = profile_timer();
        let fetched = self.rt.store.get(self.rt.space, self.part, &base_key)?;
        record_profile_timer(LookupProfileKind::BaseFetch, timer);
        let Some(raw) = fetched else {
            if self.rt.fatal_on_base_not_found {
                return Err(fatal_base_not_found(key));
            }
            warn!(
                part = %self.part,
                key = %hex::encode(key),
                "base record missing for index entry, skipping"
            );
            return Ok(None);
        };
        let record = row::decode_row(&self.plan.schema, &raw)?;
        if verdict != Qualified::Compatible {
            let timer = profile_timer();
            let verdict = self.path.qualified_row(&record);
            record_profile_timer(LookupProfileKind::Qualify, timer);
            assert_ne!(
                verdict,
                Qualified::Uncertain,
                "row-level qualification must decide"
            );
            if verdict == Qualified::Incompatible {
                return Ok(None);
            }
        }
        Ok(Some(self.plan.base_row(key, &record)))
    }
}

impl ExecNode for IndexScanExec<'_> {
    fn killed(&self) -> bool {
        self.rt.is_killed()
    }

    fn do_execute(&mut self, part: PartitionId) -> Result<()> {
        self.part = part;
        self.iter = None;
        self.path.reset_part(part);
        self.path.reset_state();
        let iter = match self.path.scan_range() {
            ScanRange::Prefix(prefix) => {
                trace!(%part, prefix = %hex::encode(prefix), "index prefix scan");
                self.rt.store.prefix(self.rt.space, part, prefix)?
            }
            ScanRange::Range(start, end) => {
                trace!(
                    %part,
                    start = %hex::encode(start),
                    end = %hex::encode(end),
                    "index range scan"
                );
                self.rt.store.range(self.rt.space, part, start, end)?
            }
        };
        self.iter = Some(iter);
        Ok(())
    }

    fn do_next(&mut self) -> Result<Option<Row>> {
        loop {
            let timer = profile_timer();
            let Some(iter) = self.iter.as_mut() else {
                return Ok(None);
            };
            if !iter.valid() {
                return Ok(None);
            }
            let expired = self.plan.expired(iter.value(), self.rt.now);
            let key = iter.key().to_vec();
            iter.next();
            record_profile_timer(LookupProfileKind::Scan, timer);
            if expired {
                continue;
            }
            let verdict = self.path.qualified(&key);
            match verdict {
                Qualified::Incompatible => continue,
                Qualified::Compatible if !self.plan.need_access_base => {
                    return self.plan.key_row(&key).map(Some);
                }
                _ => {}
            }
            if let Some(row) = self.from_base(&key, verdict)? {
                return Ok(Some(row));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::kv::{IndexWriter, MemStore};
    use crate::meta::{ColumnDef, IndexField, MemCatalog, MetaCatalog};
    use crate::types::{EdgeType, IndexId, SpaceId, TagId};

    const SPACE: SpaceId = SpaceId(1);
    const PART: PartitionId = PartitionId(2);
    const VID_LEN: usize = 8;
    const TAG: TagId = TagId(3);
    const EDGE: EdgeType = EdgeType(4);

    struct Fixture {
        store: Arc<MemStore>,
        catalog: Arc<MemCatalog>,
    }

    impl Fixture {
        fn new() -> Self {
            let person = Schema::new(vec![
                ColumnDef::new("age", ColumnType::Int),
                ColumnDef::new("name", ColumnType::String),
                ColumnDef::new("code", ColumnType::FixedString(4)),
            ]);
            let knows = Schema::new(vec![ColumnDef::new("since", ColumnType::Int)]);
            let catalog = MemCatalog::new()
                .with_tag(SPACE, TAG, person)
                .with_edge(SPACE, EDGE, knows)
                .with_index(
                    SPACE,
                    IndexDef::new(
                        IndexId(10),
                        "person_age_name",
                        IndexTarget::Tag(TAG),
                        vec![
                            IndexField::new("age", ColumnType::Int),
                            IndexField::string("name", 4),
                            IndexField::string("code", 4),
                        ],
                    ),
                )
                .with_index(
                    SPACE,
                    IndexDef::new(
                        IndexId(11),
                        "knows_since",
                        IndexTarget::Edge(EDGE),
                        vec![IndexField::new("since", ColumnType::Int)],
                    ),
                );
            Self {
                store: Arc::new(MemStore::new()),
                catalog: Arc::new(catalog),
            }
        }

        fn writer(&self) -> IndexWriter {
            IndexWriter::new(Arc::clone(&self.store), self.catalog.clone(), VID_LEN)
        }

        fn plan(&self, index: IndexId, hints: Vec<ColumnHint>, columns: &[&str]) -> Result<IndexScanPlan> {
            let def = self.catalog.index(SPACE, index)?;
            let schema = match def.target {
                IndexTarget::Tag(tag) => self.catalog.tag_schema(SPACE, tag)?,
                IndexTarget::Edge(edge) => self.catalog.edge_schema(SPACE, edge)?,
            };
            let mut plan = IndexScanPlan::new(def, schema, hints, VID_LEN)?;
            plan.init(&mut InitContext::new(columns.iter().copied()))?;
            Ok(plan)
        }

        fn run(&self, plan: &IndexScanPlan, fatal: bool) -> Result<Vec<Row>> {
            let killed = AtomicBool::new(false);
            let rt = RuntimeContext {
                space: SPACE,
                store: self.store.as_ref(),
                killed: &killed,
                now: 1_000,
                fatal_on_base_not_found: fatal,
            };
            let mut exec = plan.instantiate(&rt);
            exec.execute(PART)?;
            let mut rows = Vec::new();
            while let Some(row) = exec.next()? {
                rows.push(row);
            }
            Ok(rows)
        }
    }

    fn person(age: i64, name: &str, code: &str) -> Vec<Value> {
        vec![Value::Int(age), Value::from(name), Value::from(code)]
    }

    #[test]
    fn index_only_columns_skip_base_records() -> Result<()> {
        let fx = Fixture::new();
        fx.writer().insert_vertex(SPACE, PART, "v1", TAG, person(30, "ann", "ab"))?;
        let plan = fx.plan(IndexId(10), vec![ColumnHint::equal("age", 30i64)], &["_vid", "age", "code"])?;
        assert!(!plan.need_access_base());
        // Drop the base record: an index-only answer must not notice.
        fx.store.remove(SPACE, PART, &key::vertex_key(PART, b"v1\0\0\0\0\0\0", TAG));
        let rows = fx.run(&plan, true)?;
        assert_eq!(
            rows,
            vec![vec![Value::from("v1"), Value::Int(30), Value::from("ab")]]
        );
        Ok(())
    }

    #[test]
    fn variable_strings_need_base_records() -> Result<()> {
        let fx = Fixture::new();
        fx.writer().insert_vertex(SPACE, PART, "v1", TAG, person(30, "annabel", "ab"))?;
        let plan = fx.plan(IndexId(10), vec![ColumnHint::equal("age", 30i64)], &["name"])?;
        assert!(plan.need_access_base());
        assert_eq!(fx.run(&plan, false)?, vec![vec![Value::from("annabel")]]);
        Ok(())
    }

    #[test]
    fn missing_base_record_skips_or_fails() -> Result<()> {
        let fx = Fixture::new();
        fx.writer().insert_vertex(SPACE, PART, "v1", TAG, person(30, "ann", "ab"))?;
        fx.store.remove(SPACE, PART, &key::vertex_key(PART, b"v1\0\0\0\0\0\0", TAG));
        let plan = fx.plan(IndexId(10), vec![ColumnHint::equal("age", 30i64)], &["name"])?;
        assert!(fx.run(&plan, false)?.is_empty());
        assert!(matches!(fx.run(&plan, true), Err(LookupError::BaseNotFound(_))));
        Ok(())
    }

    #[test]
    fn edge_scan_exposes_reserved_columns() -> Result<()> {
        let fx = Fixture::new();
        let writer = fx.writer();
        writer.insert_edge(SPACE, PART, "a", EDGE, 7, "b", vec![Value::Int(2001)])?;
        writer.insert_edge(SPACE, PART, "a", EDGE, -1, "c", vec![Value::Int(2010)])?;
        let hint = ColumnHint::range("since", Some(Value::Int(2005)), true, None, false);
        let plan = fx.plan(IndexId(11), vec![hint], &["_src", "_rank", "_dst", "_type"])?;
        assert!(!plan.need_access_base());
        let rows = fx.run(&plan, false)?;
        assert_eq!(
            rows,
            // Output follows sorted column order: _dst, _rank, _src, _type.
            vec![vec![
                Value::from("c"),
                Value::Int(-1),
                Value::from("a"),
                Value::Int(4),
            ]]
        );
        Ok(())
    }

    #[test]
    fn reserved_columns_are_target_specific() -> Result<()> {
        let fx = Fixture::new();
        let def = fx.catalog.index(SPACE, IndexId(10))?;
        let schema = fx.catalog.tag_schema(SPACE, TAG)?;
        let mut plan = IndexScanPlan::new(def, schema, Vec::new(), VID_LEN)?;
        let err = plan.init(&mut InitContext::new(["_src"]));
        assert!(matches!(err, Err(LookupError::FieldNotFound(c)) if c == "_src"));
        Ok(())
    }

    #[test]
    fn expired_entries_are_skipped() -> Result<()> {
        let tag = TagId(9);
        let schema = Schema::new(vec![ColumnDef::new("ts", ColumnType::Int)]).with_ttl("ts", 100);
        let catalog = MemCatalog::new().with_tag(SPACE, tag, schema).with_index(
            SPACE,
            IndexDef::new(
                IndexId(12),
                "ts",
                IndexTarget::Tag(tag),
                vec![IndexField::new("ts", ColumnType::Int)],
            ),
        );
        let fx = Fixture {
            store: Arc::new(MemStore::new()),
            catalog: Arc::new(catalog),
        };
        let writer = fx.writer();
        writer.insert_vertex(SPACE, PART, "old", tag, vec![Value::Int(800)])?;
        writer.insert_vertex(SPACE, PART, "new", tag, vec![Value::Int(950)])?;
        let plan = fx.plan(IndexId(12), Vec::new(), &["_vid"])?;
        assert_eq!(fx.run(&plan, false)?, vec![vec![Value::from("new")]]);
        Ok(())
    }
}
