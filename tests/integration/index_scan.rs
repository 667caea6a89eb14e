use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use sombra_lookup::codec::geo::{self, GeoPoint};
use sombra_lookup::kv::{IndexWriter, MemStore};
use sombra_lookup::lookup::{IndexQueryContext, LookupProcessor, LookupRequest, LookupResponse};
use sombra_lookup::meta::{ColumnDef, ColumnType, IndexDef, IndexField, IndexTarget, MemCatalog, Schema};
use sombra_lookup::scan::ColumnHint;
use sombra_lookup::types::{EdgeType, IndexId, PartitionId, SpaceId, TagId};
use sombra_lookup::{ErrorCode, LookupConfig, Value};

const SPACE: SpaceId = SpaceId(1);
const PART: PartitionId = PartitionId(1);
const PERSON: TagId = TagId(1);
const PLACE: TagId = TagId(2);
const READING: TagId = TagId(3);
const SESSION: TagId = TagId(4);
const FOLLOWS: EdgeType = EdgeType(5);

const AGE_NAME: IndexId = IndexId(1);
const LOC: IndexId = IndexId(2);
const SCORE: IndexId = IndexId(3);
const LEVEL: IndexId = IndexId(4);
const SEEN: IndexId = IndexId(5);
const WEIGHT: IndexId = IndexId(6);

struct Graph {
    store: Arc<MemStore>,
    catalog: Arc<MemCatalog>,
}

impl Graph {
    fn new() -> Self {
        let catalog = MemCatalog::new()
            .with_tag(
                SPACE,
                PERSON,
                Schema::new(vec![
                    ColumnDef::new("age", ColumnType::Int),
                    ColumnDef::new("name", ColumnType::String),
                ]),
            )
            .with_index(
                SPACE,
                IndexDef::new(
                    AGE_NAME,
                    "person_age_name",
                    IndexTarget::Tag(PERSON),
                    vec![
                        IndexField::new("age", ColumnType::Int),
                        IndexField::string("name", 5),
                    ],
                ),
            )
            .with_tag(
                SPACE,
                PLACE,
                Schema::new(vec![ColumnDef::new("loc", ColumnType::Geography)]),
            )
            .with_index(
                SPACE,
                IndexDef::new(
                    LOC,
                    "place_loc",
                    IndexTarget::Tag(PLACE),
                    vec![IndexField::new("loc", ColumnType::Geography)],
                ),
            )
            .with_tag(
                SPACE,
                READING,
                Schema::new(vec![
                    ColumnDef::nullable("score", ColumnType::Float),
                    ColumnDef::nullable("level", ColumnType::Int),
                ]),
            )
            .with_index(
                SPACE,
                IndexDef::new(
                    SCORE,
                    "reading_score",
                    IndexTarget::Tag(READING),
                    vec![IndexField::new("score", ColumnType::Float).nullable()],
                ),
            )
            .with_index(
                SPACE,
                IndexDef::new(
                    LEVEL,
                    "reading_level",
                    IndexTarget::Tag(READING),
                    vec![IndexField::new("level", ColumnType::Int).nullable()],
                ),
            )
            .with_tag(
                SPACE,
                SESSION,
                Schema::new(vec![ColumnDef::new("seen", ColumnType::Int)]).with_ttl("seen", 60),
            )
            .with_index(
                SPACE,
                IndexDef::new(
                    SEEN,
                    "session_seen",
                    IndexTarget::Tag(SESSION),
                    vec![IndexField::new("seen", ColumnType::Int)],
                ),
            )
            .with_edge(
                SPACE,
                FOLLOWS,
                Schema::new(vec![ColumnDef::new("weight", ColumnType::Int)]),
            )
            .with_index(
                SPACE,
                IndexDef::new(
                    WEIGHT,
                    "follows_weight",
                    IndexTarget::Edge(FOLLOWS),
                    vec![IndexField::new("weight", ColumnType::Int)],
                ),
            );
        Self {
            store: Arc::new(MemStore::new()),
            catalog: Arc::new(catalog),
        }
    }

    fn writer(&self) -> IndexWriter {
        IndexWriter::new(Arc::clone(&self.store), self.catalog.clone(), 8)
    }

    fn processor(&self) -> LookupProcessor {
        LookupProcessor::new(self.store.clone(), self.catalog.clone(), LookupConfig::sequential())
            .unwrap()
    }

    fn lookup(&self, target: IndexTarget, index: IndexId, hints: Vec<ColumnHint>, columns: &[&str]) -> LookupResponse {
        let req = request(target, index, hints, columns);
        let resp = self.processor().process(&req);
        assert!(resp.all_succeeded(), "lookup failed: {:?}", resp.results);
        resp
    }
}

fn request(target: IndexTarget, index: IndexId, hints: Vec<ColumnHint>, columns: &[&str]) -> LookupRequest {
    LookupRequest::new(
        SPACE,
        vec![PART],
        target,
        IndexQueryContext::new(index, hints),
        columns.iter().map(|c| c.to_string()).collect(),
    )
}

fn ints(resp: &LookupResponse, column: &str) -> Vec<i64> {
    resp.data
        .column(column)
        .unwrap()
        .into_iter()
        .map(|v| match v {
            Value::Int(i) => *i,
            other => panic!("expected int, got {other}"),
        })
        .collect()
}

fn strings(resp: &LookupResponse, column: &str) -> Vec<String> {
    let mut out: Vec<String> = resp
        .data
        .column(column)
        .unwrap()
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => panic!("expected string, got {other}"),
        })
        .collect();
    out.sort();
    out
}

fn people(graph: &Graph) {
    let writer = graph.writer();
    for age in 1..=10i64 {
        writer
            .insert_vertex(SPACE, PART, &format!("p{age}"), PERSON, vec![Value::Int(age), Value::from("x")])
            .unwrap();
    }
}

#[test]
fn half_open_range_includes_start_and_excludes_end() {
    let graph = Graph::new();
    people(&graph);
    let hint = ColumnHint::half_open("age", 3i64, 7i64);
    let resp = graph.lookup(IndexTarget::Tag(PERSON), AGE_NAME, vec![hint], &["age"]);
    assert_eq!(ints(&resp, "age"), vec![3, 4, 5, 6]);
}

#[test]
fn exclusive_start_and_inclusive_end() {
    let graph = Graph::new();
    people(&graph);
    let hint = ColumnHint::range("age", Some(Value::Int(3)), false, Some(Value::Int(7)), true);
    let resp = graph.lookup(IndexTarget::Tag(PERSON), AGE_NAME, vec![hint], &["age"]);
    assert_eq!(ints(&resp, "age"), vec![4, 5, 6, 7]);
}

#[test]
fn one_sided_ranges() {
    let graph = Graph::new();
    people(&graph);
    let below = ColumnHint::range("age", None, false, Some(Value::Int(3)), false);
    let resp = graph.lookup(IndexTarget::Tag(PERSON), AGE_NAME, vec![below], &["age"]);
    assert_eq!(ints(&resp, "age"), vec![1, 2]);
    let above = ColumnHint::range("age", Some(Value::Int(9)), true, None, false);
    let resp = graph.lookup(IndexTarget::Tag(PERSON), AGE_NAME, vec![above], &["age"]);
    assert_eq!(ints(&resp, "age"), vec![9, 10]);
}

#[test]
fn truncated_equality_is_decided_by_base_record() {
    let graph = Graph::new();
    let writer = graph.writer();
    writer
        .insert_vertex(SPACE, PART, "a", PERSON, vec![Value::Int(30), Value::from("alice123")])
        .unwrap();
    writer
        .insert_vertex(SPACE, PART, "b", PERSON, vec![Value::Int(30), Value::from("alicexyz")])
        .unwrap();
    writer
        .insert_vertex(SPACE, PART, "c", PERSON, vec![Value::Int(30), Value::from("bob")])
        .unwrap();
    let hints = vec![
        ColumnHint::equal("age", 30i64),
        ColumnHint::equal("name", "alice123"),
    ];
    let resp = graph.lookup(IndexTarget::Tag(PERSON), AGE_NAME, hints, &["_vid"]);
    assert_eq!(strings(&resp, "_vid"), vec!["a".to_string()]);
}

#[test]
fn truncated_range_bound_matches_full_comparison() {
    let graph = Graph::new();
    let writer = graph.writer();
    for (vid, name) in [("a", "alicd"), ("b", "alice"), ("c", "alice0"), ("d", "alicez"), ("e", "alicf")] {
        writer
            .insert_vertex(SPACE, PART, vid, PERSON, vec![Value::Int(1), Value::from(name)])
            .unwrap();
    }
    let hints = vec![
        ColumnHint::equal("age", 1i64),
        ColumnHint::range("name", Some(Value::from("alice1")), false, None, false),
    ];
    let resp = graph.lookup(IndexTarget::Tag(PERSON), AGE_NAME, hints, &["name"]);
    assert_eq!(
        strings(&resp, "name"),
        vec!["alicez".to_string(), "alicf".to_string()]
    );
}

#[test]
fn nan_is_never_in_a_float_range() {
    let graph = Graph::new();
    let writer = graph.writer();
    for (vid, score) in [("r1", 1.5), ("r2", f64::NAN), ("r3", 7.0), ("r4", f64::INFINITY)] {
        writer
            .insert_vertex(SPACE, PART, vid, READING, vec![Value::Float(score), Value::Null])
            .unwrap();
    }
    writer
        .insert_vertex(SPACE, PART, "r5", READING, vec![Value::Null, Value::Null])
        .unwrap();

    let bounded = ColumnHint::range("score", Some(Value::Int(0)), true, Some(Value::Float(10.0)), false);
    let resp = graph.lookup(IndexTarget::Tag(READING), SCORE, vec![bounded], &["_vid"]);
    assert_eq!(strings(&resp, "_vid"), vec!["r1".to_string(), "r3".to_string()]);

    let unbounded = ColumnHint::range("score", Some(Value::Float(0.0)), true, None, false);
    let resp = graph.lookup(IndexTarget::Tag(READING), SCORE, vec![unbounded], &["_vid"]);
    assert_eq!(
        strings(&resp, "_vid"),
        vec!["r1".to_string(), "r3".to_string(), "r4".to_string()]
    );
}

#[test]
fn null_and_max_value_share_bytes_but_not_results() {
    let graph = Graph::new();
    let writer = graph.writer();
    writer
        .insert_vertex(SPACE, PART, "n", READING, vec![Value::Null, Value::Null])
        .unwrap();
    writer
        .insert_vertex(SPACE, PART, "m", READING, vec![Value::Null, Value::Int(i64::MAX)])
        .unwrap();
    writer
        .insert_vertex(SPACE, PART, "z", READING, vec![Value::Null, Value::Int(0)])
        .unwrap();

    let is_max = ColumnHint::equal("level", i64::MAX);
    let resp = graph.lookup(IndexTarget::Tag(READING), LEVEL, vec![is_max], &["_vid", "level"]);
    assert_eq!(resp.data.rows, vec![vec![Value::from("m"), Value::Int(i64::MAX)]]);

    let is_null = ColumnHint::equal("level", Value::Null);
    let resp = graph.lookup(IndexTarget::Tag(READING), LEVEL, vec![is_null], &["_vid", "level"]);
    assert_eq!(resp.data.rows, vec![vec![Value::from("n"), Value::Null]]);

    let non_negative = ColumnHint::range("level", Some(Value::Int(0)), true, None, false);
    let resp = graph.lookup(IndexTarget::Tag(READING), LEVEL, vec![non_negative], &["_vid"]);
    assert_eq!(strings(&resp, "_vid"), vec!["m".to_string(), "z".to_string()]);
}

#[test]
fn geo_entities_appear_once_despite_fan_out() {
    let graph = Graph::new();
    let writer = graph.writer();
    let points = [("berlin", 13.4, 52.5), ("lima", -77.0, -12.0)];
    for (vid, lng, lat) in points {
        let point = GeoPoint::new(lng, lat).unwrap();
        writer
            .insert_vertex(SPACE, PART, vid, PLACE, vec![Value::Geography(point)])
            .unwrap();
    }
    assert_eq!(graph.store.len(SPACE, PART), points.len() * (1 + geo::COVER_LEVELS.len()));

    let all_cells = ColumnHint::range(
        "loc",
        Some(Value::Bytes(vec![0; 8])),
        true,
        Some(Value::Bytes(vec![0xFF; 8])),
        false,
    );
    let resp = graph.lookup(IndexTarget::Tag(PLACE), LOC, vec![all_cells], &["_vid"]);
    assert_eq!(strings(&resp, "_vid"), vec!["berlin".to_string(), "lima".to_string()]);

    let berlin = GeoPoint::new(13.4, 52.5).unwrap();
    let cell = geo::cell_id(&berlin, geo::COVER_LEVELS[1]);
    let hint = ColumnHint::equal("loc", Value::Bytes(geo::cell_key(cell).to_vec()));
    let resp = graph.lookup(IndexTarget::Tag(PLACE), LOC, vec![hint], &["_vid", "loc"]);
    assert_eq!(resp.data.rows, vec![vec![Value::from("berlin"), Value::Geography(berlin)]]);
}

#[test]
fn expired_entries_are_invisible() {
    let graph = Graph::new();
    let writer = graph.writer();
    writer
        .insert_vertex(SPACE, PART, "old", SESSION, vec![Value::Int(100)])
        .unwrap();
    writer
        .insert_vertex(SPACE, PART, "new", SESSION, vec![Value::Int(500)])
        .unwrap();
    let req = request(IndexTarget::Tag(SESSION), SEEN, Vec::new(), &["_vid"]);
    let killed = AtomicBool::new(false);
    let resp = graph.processor().process_with(&req, &killed, 520);
    assert_eq!(strings(&resp, "_vid"), vec!["new".to_string()]);
    let resp = graph.processor().process_with(&req, &killed, 100);
    assert_eq!(resp.data.len(), 2);
}

#[test]
fn edge_index_scan_returns_edge_identity() {
    let graph = Graph::new();
    let writer = graph.writer();
    writer
        .insert_edge(SPACE, PART, "a", FOLLOWS, 0, "b", vec![Value::Int(3)])
        .unwrap();
    writer
        .insert_edge(SPACE, PART, "a", FOLLOWS, 1, "b", vec![Value::Int(8)])
        .unwrap();
    writer
        .insert_edge(SPACE, PART, "c", FOLLOWS, 0, "a", vec![Value::Int(9)])
        .unwrap();
    let hint = ColumnHint::range("weight", Some(Value::Int(5)), true, None, false);
    let resp = graph.lookup(
        IndexTarget::Edge(FOLLOWS),
        WEIGHT,
        vec![hint],
        &["_src", "_rank", "_dst", "weight"],
    );
    assert_eq!(
        resp.data.rows,
        vec![
            vec![Value::from("a"), Value::Int(1), Value::from("b"), Value::Int(8)],
            vec![Value::from("c"), Value::Int(0), Value::from("a"), Value::Int(9)],
        ]
    );
}

#[test]
fn unknown_columns_fail_the_request() {
    let graph = Graph::new();
    let req = request(IndexTarget::Tag(PERSON), AGE_NAME, Vec::new(), &["_src"]);
    let resp = graph.processor().process(&req);
    assert_eq!(resp.results[0].code, ErrorCode::FieldNotFound);
}
