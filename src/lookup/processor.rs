//! Plans a lookup request once and runs it over every requested partition.

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use super::{DataSet, LookupRequest, LookupResponse, PartitionResult};
use crate::config::LookupConfig;
use crate::error::{ErrorCode, LookupError, Result};
use crate::exec::{
    AggregatePlan, DedupPlan, ExecNode, InitContext, LimitPlan, PlanNode, ProjectionPlan,
    RuntimeContext, SelectionPlan, TopNPlan,
};
use crate::kv::KvStore;
use crate::meta::{IndexDef, IndexTarget, MetaCatalog};
use crate::scan::{ColumnHint, IndexScanPlan, ScanType};
use crate::types::{PartitionId, MAX_PARTITION_ID};
use crate::value::{Row, Value};

/// Rows and statistics produced by one partition run.
struct PartOutput {
    rows: Vec<Row>,
    aggregates: Option<Vec<Value>>,
}

/// Plans lookup requests and runs them over every requested partition.
///
/// The plan is built and initialised once per request. Sequential mode
/// re-executes a single execution tree per partition on the calling thread;
/// parallel mode gives every partition its own execution tree on the worker
/// pool and waits for all of them.
pub struct LookupProcessor {
    store: Arc<dyn KvStore>,
    catalog: Arc<dyn MetaCatalog>,
    config: LookupConfig,
    pool: Option<ThreadPool>,
}

impl LookupProcessor {
    /// Creates a processor; builds the worker pool when `config.parallel` is set.
    pub fn new(
        store: Arc<dyn KvStore>,
        catalog: Arc<dyn MetaCatalog>,
        config: LookupConfig,
    ) -> Result<Self> {
        let pool = if config.parallel {
            let mut builder =
                ThreadPoolBuilder::new().thread_name(|i| format!("lookup-worker-{i}"));
            if config.worker_threads > 0 {
                builder = builder.num_threads(config.worker_threads);
            }
            Some(
                builder
                    .build()
                    .map_err(|err| LookupError::WorkerPool(err.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self {
            store,
            catalog,
            config,
            pool,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Runs `req` with a fresh kill flag and the current wall-clock time.
    pub fn process(&self, req: &LookupRequest) -> LookupResponse {
        let killed = AtomicBool::new(false);
        self.process_with(req, &killed, unix_now())
    }

    /// Runs `req`, observing `killed` and evaluating TTLs against `now`
    /// (seconds since the Unix epoch).
    pub fn process_with(&self, req: &LookupRequest, killed: &AtomicBool, now: i64) -> LookupResponse {
        let plan = match self.build_plan(req) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(space = %req.space, code = %err.code(), error = %err, "lookup request rejected");
                return request_failed(req, &err);
            }
        };
        let rt = RuntimeContext {
            space: req.space,
            store: self.store.as_ref(),
            killed,
            now,
            fatal_on_base_not_found: self.config.fatal_on_base_not_found,
        };
        let outputs: Vec<Result<PartOutput>> = match &self.pool {
            Some(pool) => pool.install(|| {
                req.parts
                    .par_iter()
                    .map(|part| {
                        let mut exec = plan.instantiate(&rt);
                        run_partition(exec.as_mut(), *part)
                    })
                    .collect()
            }),
            None => {
                let mut exec = plan.instantiate(&rt);
                req.parts
                    .iter()
                    .map(|part| run_partition(exec.as_mut(), *part))
                    .collect()
            }
        };
        assemble(req, outputs)
    }

    /// Builds and initialises the plan tree for `req`.
    pub fn build_plan(&self, req: &LookupRequest) -> Result<PlanNode> {
        self.validate(req)?;
        let schema = match req.target {
            IndexTarget::Tag(tag) => self.catalog.tag_schema(req.space, tag)?,
            IndexTarget::Edge(edge) => self.catalog.edge_schema(req.space, edge)?,
        };
        let mut branches = Vec::with_capacity(req.contexts.len());
        for ctx in &req.contexts {
            let index = self.catalog.index(req.space, ctx.index_id)?;
            if index.target != req.target {
                return Err(LookupError::invalid(format!(
                    "index {} is not defined over the requested schema",
                    index.id
                )));
            }
            validate_hints(&index, &ctx.hints)?;
            let scan = IndexScanPlan::new(
                index,
                Arc::clone(&schema),
                ctx.hints.clone(),
                self.config.vid_len,
            )?
            .into_node();
            let filtered = match &ctx.filter {
                Some(filter) => PlanNode::Selection(SelectionPlan::new(scan, filter.clone())),
                None => scan,
            };
            branches.push(PlanNode::Projection(ProjectionPlan::new(
                filtered,
                req.return_columns.clone(),
            )));
        }
        let mut root = match branches.len() {
            1 => branches.remove(0),
            _ => PlanNode::Dedup(DedupPlan::new(branches, Vec::new())),
        };
        if let Some(limit) = req.limit {
            root = if req.order_by.is_empty() {
                PlanNode::Limit(LimitPlan::new(root, req.offset, limit))
            } else {
                PlanNode::TopN(TopNPlan::new(root, req.order_by.clone(), req.offset, limit))
            };
        }
        if !req.stat_columns.is_empty() {
            root = PlanNode::Aggregate(AggregatePlan::new(root, req.stat_columns.clone()));
        }
        let mut ctx = InitContext::new(req.return_columns.iter().cloned());
        root.init(&mut ctx)?;
        debug!(space = %req.space, plan = %root.explain(), "lookup plan built");
        Ok(root)
    }

    fn validate(&self, req: &LookupRequest) -> Result<()> {
        if req.contexts.is_empty() {
            return Err(LookupError::invalid("no index query context"));
        }
        if req.return_columns.is_empty() {
            return Err(LookupError::invalid("no return columns"));
        }
        if req.parts.len() > self.config.max_partitions {
            return Err(LookupError::invalid(format!(
                "{} partitions exceed the limit of {}",
                req.parts.len(),
                self.config.max_partitions
            )));
        }
        let mut seen = BTreeSet::new();
        for part in &req.parts {
            if part.0 > MAX_PARTITION_ID {
                return Err(LookupError::invalid(format!("partition {part} out of range")));
            }
            if !seen.insert(*part) {
                return Err(LookupError::invalid(format!("partition {part} requested twice")));
            }
        }
        if !req.order_by.is_empty() && req.limit.is_none() {
            return Err(LookupError::invalid("order by requires a limit"));
        }
        if req.offset > 0 && req.limit.is_none() {
            return Err(LookupError::invalid("offset requires a limit"));
        }
        let returned = |column: &str| req.return_columns.iter().any(|c| c == column);
        if let Some(order) = req.order_by.iter().find(|o| !returned(&o.column)) {
            return Err(LookupError::invalid(format!(
                "order by column '{}' is not returned",
                order.column
            )));
        }
        if let Some(stat) = req.stat_columns.iter().find(|s| !returned(&s.column)) {
            return Err(LookupError::invalid(format!(
                "statistic column '{}' is not returned",
                stat.column
            )));
        }
        Ok(())
    }
}

/// Checks the shape `Path` relies on: hints follow index field order and
/// only the last one may be a range with at least one non-null bound.
fn validate_hints(index: &IndexDef, hints: &[ColumnHint]) -> Result<()> {
    if hints.len() > index.fields.len() {
        return Err(LookupError::invalid(format!(
            "{} column hints for an index of {} fields",
            hints.len(),
            index.fields.len()
        )));
    }
    for (i, (hint, field)) in hints.iter().zip(&index.fields).enumerate() {
        if hint.column != field.name {
            return Err(LookupError::invalid(format!(
                "column hint on '{}' does not follow the fields of index {}",
                hint.column, index.id
            )));
        }
        if hint.scan_type == ScanType::Range {
            if i + 1 != hints.len() {
                return Err(LookupError::invalid("only the last column hint may be a range"));
            }
            let bounds = [&hint.begin, &hint.end];
            if bounds.iter().all(|b| b.is_none()) {
                return Err(LookupError::invalid("range hint without bounds"));
            }
            if bounds.iter().any(|b| matches!(b, Some(Value::Null))) {
                return Err(LookupError::invalid("range bounds cannot be NULL"));
            }
        }
    }
    Ok(())
}

fn run_partition(exec: &mut dyn ExecNode, part: PartitionId) -> Result<PartOutput> {
    exec.execute(part)?;
    let mut rows = Vec::new();
    while let Some(row) = exec.next()? {
        rows.push(row);
    }
    Ok(PartOutput {
        rows,
        aggregates: exec.aggregates(),
    })
}

fn assemble(req: &LookupRequest, outputs: Vec<Result<PartOutput>>) -> LookupResponse {
    let mut data = DataSet::new(req.return_columns.clone());
    let mut results = Vec::with_capacity(req.parts.len());
    let mut stats: Option<Vec<Value>> = (!req.stat_columns.is_empty())
        .then(|| req.stat_columns.iter().map(|s| s.initial()).collect());
    for (part, output) in req.parts.iter().zip(outputs) {
        match output {
            Ok(output) => {
                data.rows.extend(output.rows);
                if let (Some(merged), Some(partial)) = (stats.as_mut(), output.aggregates) {
                    for ((stat, acc), value) in req.stat_columns.iter().zip(merged).zip(&partial) {
                        stat.merge(acc, value);
                    }
                }
                results.push(PartitionResult {
                    part: *part,
                    code: ErrorCode::Succeeded,
                    message: None,
                });
            }
            Err(err) => {
                warn!(%part, code = %err.code(), error = %err, "partition lookup failed");
                results.push(PartitionResult {
                    part: *part,
                    code: err.code(),
                    message: Some(err.to_string()),
                });
            }
        }
    }
    debug!(
        rows = data.len(),
        parts = results.len(),
        failed = results.iter().filter(|r| !r.code.is_ok()).count(),
        "lookup finished"
    );
    LookupResponse {
        data,
        results,
        stats: stats.map(|values| DataSet {
            columns: req.stat_columns.iter().map(|s| s.alias.clone()).collect(),
            rows: vec![values],
        }),
    }
}

fn request_failed(req: &LookupRequest, err: &LookupError) -> LookupResponse {
    LookupResponse {
        data: DataSet::new(req.return_columns.clone()),
        results: req
            .parts
            .iter()
            .map(|part| PartitionResult {
                part: *part,
                code: err.code(),
                message: Some(err.to_string()),
            })
            .collect(),
        stats: None,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
