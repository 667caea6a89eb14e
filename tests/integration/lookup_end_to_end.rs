use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Once};

use sombra_lookup::exec::{CmpOp, Expr, OrderBy, StatKind, StatProp};
use sombra_lookup::kv::{IndexWriter, MemStore};
use sombra_lookup::lookup::{IndexQueryContext, LookupProcessor, LookupRequest};
use sombra_lookup::meta::{ColumnDef, ColumnType, IndexDef, IndexField, IndexTarget, MemCatalog, Schema};
use sombra_lookup::scan::ColumnHint;
use sombra_lookup::types::{IndexId, PartitionId, SpaceId, TagId};
use sombra_lookup::{ErrorCode, LookupConfig, Value};
use tracing_subscriber::EnvFilter;

const SPACE: SpaceId = SpaceId(7);
const PLAYER: TagId = TagId(1);
const BY_AGE: IndexId = IndexId(1);
const BY_TEAM: IndexId = IndexId(2);
const PARTS: [PartitionId; 3] = [PartitionId(1), PartitionId(2), PartitionId(3)];

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sombra_lookup=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

struct Fixture {
    store: Arc<MemStore>,
    catalog: Arc<MemCatalog>,
}

/// Twelve players spread over three partitions: player `i` is `i + 20`
/// years old, plays for team `i % 3` and lives in partition `i % 3 + 1`.
fn fixture() -> Fixture {
    init_tracing();
    let catalog = MemCatalog::new()
        .with_tag(
            SPACE,
            PLAYER,
            Schema::new(vec![
                ColumnDef::new("age", ColumnType::Int),
                ColumnDef::new("team", ColumnType::Int),
                ColumnDef::nullable("name", ColumnType::String),
            ]),
        )
        .with_index(
            SPACE,
            IndexDef::new(
                BY_AGE,
                "player_age",
                IndexTarget::Tag(PLAYER),
                vec![IndexField::new("age", ColumnType::Int)],
            ),
        )
        .with_index(
            SPACE,
            IndexDef::new(
                BY_TEAM,
                "player_team",
                IndexTarget::Tag(PLAYER),
                vec![IndexField::new("team", ColumnType::Int)],
            ),
        );
    let fx = Fixture {
        store: Arc::new(MemStore::new()),
        catalog: Arc::new(catalog),
    };
    let writer = IndexWriter::new(Arc::clone(&fx.store), fx.catalog.clone(), 8);
    for i in 0..12i64 {
        let part = PartitionId((i % 3) as u32 + 1);
        let name = if i == 5 { Value::Null } else { Value::from(format!("player{i}")) };
        writer
            .insert_vertex(SPACE, part, &format!("v{i}"), PLAYER, vec![Value::Int(i + 20), Value::Int(i % 3), name])
            .unwrap();
    }
    fx
}

impl Fixture {
    fn processor(&self, config: LookupConfig) -> LookupProcessor {
        LookupProcessor::new(self.store.clone(), self.catalog.clone(), config).unwrap()
    }
}

fn age_request(hint: ColumnHint, columns: &[&str]) -> LookupRequest {
    LookupRequest::new(
        SPACE,
        PARTS.to_vec(),
        IndexTarget::Tag(PLAYER),
        IndexQueryContext::new(BY_AGE, vec![hint]),
        columns.iter().map(|c| c.to_string()).collect(),
    )
}

fn sorted_ints(rows: &[Vec<Value>], pos: usize) -> Vec<i64> {
    let mut out: Vec<i64> = rows
        .iter()
        .map(|r| match &r[pos] {
            Value::Int(v) => *v,
            other => panic!("expected int, got {other}"),
        })
        .collect();
    out.sort_unstable();
    out
}

#[test]
fn sequential_and_parallel_agree() {
    let fx = fixture();
    let req = age_request(ColumnHint::half_open("age", 22i64, 30i64), &["_vid", "age", "name"]);
    let sequential = fx.processor(LookupConfig::sequential()).process(&req);
    let parallel = fx.processor(LookupConfig::parallel(3)).process(&req);
    assert!(sequential.all_succeeded());
    assert!(parallel.all_succeeded());
    assert_eq!(sorted_ints(&sequential.data.rows, 1), (22..30).collect::<Vec<_>>());
    let mut a = sequential.data.rows.clone();
    let mut b = parallel.data.rows.clone();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(
        parallel.results.iter().map(|r| r.part).collect::<Vec<_>>(),
        PARTS.to_vec()
    );
}

#[test]
fn overlapping_contexts_are_deduplicated() {
    let fx = fixture();
    let req = age_request(ColumnHint::half_open("age", 20i64, 26i64), &["_vid", "age"])
        .or_context(IndexQueryContext::new(BY_TEAM, vec![ColumnHint::equal("team", 0i64)]));
    let resp = fx.processor(LookupConfig::sequential()).process(&req);
    assert!(resp.all_succeeded());
    // Ages 20..26 plus team 0 (ages 20, 23, 26, 29); 20 and 23 match both.
    assert_eq!(
        sorted_ints(&resp.data.rows, 1),
        vec![20, 21, 22, 23, 24, 25, 26, 29]
    );
}

#[test]
fn filter_runs_on_base_columns() {
    let fx = fixture();
    let filter = Expr::Not(Box::new(Expr::IsNull(Box::new(Expr::column("name")))));
    let mut req = age_request(ColumnHint::half_open("age", 20i64, 32i64), &["age"]);
    req.contexts[0] = req.contexts[0].clone().with_filter(filter);
    let resp = fx.processor(LookupConfig::sequential()).process(&req);
    let ages = sorted_ints(&resp.data.rows, 0);
    assert_eq!(ages.len(), 11);
    assert!(!ages.contains(&25));

    let filter = Expr::compare("team", CmpOp::Eq, 1i64);
    let mut req = age_request(ColumnHint::half_open("age", 20i64, 32i64), &["age"]);
    req.contexts[0] = req.contexts[0].clone().with_filter(filter);
    let resp = fx.processor(LookupConfig::sequential()).process(&req);
    assert_eq!(sorted_ints(&resp.data.rows, 0), vec![21, 24, 27, 30]);
}

#[test]
fn limit_and_top_n_apply_per_partition() {
    let fx = fixture();
    let req = age_request(ColumnHint::half_open("age", 20i64, 32i64), &["age"]).with_limit(2);
    let resp = fx.processor(LookupConfig::sequential()).process(&req);
    // Each partition scans in key order and keeps its two youngest.
    assert_eq!(sorted_ints(&resp.data.rows, 0), vec![20, 21, 22, 23, 24, 25]);

    let req = age_request(ColumnHint::half_open("age", 20i64, 32i64), &["age"])
        .with_limit(1)
        .with_order_by(vec![OrderBy::desc("age")]);
    let resp = fx.processor(LookupConfig::parallel(2)).process(&req);
    assert_eq!(sorted_ints(&resp.data.rows, 0), vec![29, 30, 31]);
}

#[test]
fn statistics_merge_across_partitions() {
    let fx = fixture();
    let req = age_request(ColumnHint::half_open("age", 20i64, 32i64), &["age"]).with_stats(vec![
        StatProp::new("n", "age", StatKind::Count),
        StatProp::new("total", "age", StatKind::Sum),
        StatProp::new("oldest", "age", StatKind::Max),
        StatProp::new("youngest", "age", StatKind::Min),
    ]);
    let resp = fx.processor(LookupConfig::parallel(3)).process(&req);
    assert_eq!(resp.data.len(), 12);
    let stats = resp.stats.expect("statistics requested");
    assert_eq!(stats.columns, vec!["n", "total", "oldest", "youngest"]);
    assert_eq!(
        stats.rows,
        vec![vec![Value::Int(12), Value::Int((20..32).sum()), Value::Int(31), Value::Int(20)]]
    );
}

#[test]
fn killed_request_reports_every_partition() {
    let fx = fixture();
    let req = age_request(ColumnHint::half_open("age", 20i64, 32i64), &["age"]);
    let killed = AtomicBool::new(true);
    let resp = fx
        .processor(LookupConfig::sequential())
        .process_with(&req, &killed, 0);
    assert!(resp.data.is_empty());
    assert_eq!(resp.results.len(), PARTS.len());
    assert!(resp.results.iter().all(|r| r.code == ErrorCode::PlanKilled));
}

#[test]
fn failing_partition_does_not_hide_siblings() {
    let fx = fixture();
    fx.store.set_failing(SPACE, PartitionId(2), true);
    let req = age_request(ColumnHint::half_open("age", 20i64, 32i64), &["age"]);
    for config in [LookupConfig::sequential(), LookupConfig::parallel(3)] {
        let resp = fx.processor(config).process(&req);
        assert_eq!(resp.failed_parts(), vec![PartitionId(2)]);
        assert_eq!(resp.results[1].code, ErrorCode::StoreFailure);
        assert!(resp.results[1].message.is_some());
        assert_eq!(resp.data.len(), 8);
    }
}

#[test]
fn missing_schema_fails_the_request() {
    let fx = fixture();
    let mut req = age_request(ColumnHint::equal("age", 20i64), &["age"]);
    req.target = IndexTarget::Tag(TagId(99));
    let resp = fx.processor(LookupConfig::sequential()).process(&req);
    assert!(resp.results.iter().all(|r| r.code == ErrorCode::TagNotFound));
}

#[test]
fn fatal_base_miss_is_configurable() {
    let fx = fixture();
    let base = sombra_lookup::codec::key::vertex_key(PartitionId(1), b"v0\0\0\0\0\0\0", PLAYER);
    assert!(fx.store.remove(SPACE, PartitionId(1), &base));
    let req = age_request(ColumnHint::equal("age", 20i64), &["name"]);

    let tolerant = fx.processor(LookupConfig::sequential()).process(&req);
    assert!(tolerant.all_succeeded());
    assert!(tolerant.data.is_empty());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "fatal_on_base_not_found = true").unwrap();
    let config = LookupConfig::load(file.path()).unwrap();
    let strict = fx.processor(config).process(&req);
    assert_eq!(strict.results[0].code, ErrorCode::KeyNotFound);
}

#[test]
fn invalid_config_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "vid_len = 0").unwrap();
    assert!(LookupConfig::load(file.path()).is_err());
}
