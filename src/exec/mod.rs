//! Pull-based operator tree layered over index scans.
//!
//! A [`PlanNode`] tree is built once per request and initialised exactly
//! once. It holds only read-only data: paths, column maps, expressions.
//! [`PlanNode::instantiate`] then builds a fresh tree of [`ExecNode`]s that
//! borrows the plan and owns all mutable iteration state, so partitions can
//! run concurrently, each on its own execution tree.

mod aggregate;
mod context;
mod dedup;
mod expr;
mod limit;
mod projection;
mod selection;
mod topn;

pub use aggregate::{AggregatePlan, StatKind, StatProp};
pub use context::{InitContext, RuntimeContext};
pub use dedup::DedupPlan;
pub use expr::{CmpOp, Expr};
pub use limit::LimitPlan;
pub use projection::ProjectionPlan;
pub use selection::SelectionPlan;
pub use topn::{OrderBy, OrderDirection, TopNPlan};

use crate::error::{LookupError, Result};
use crate::scan::IndexScanPlan;
use crate::types::PartitionId;
use crate::value::{Row, Value};

/// Mutable execution state of one plan node for one partition run.
///
/// `execute` and `next` poll the request's kill flag before delegating, so a
/// killed request stops at the first node that observes the flag.
pub trait ExecNode {
    /// True once the request has been killed.
    fn killed(&self) -> bool;

    /// Resets state for `part` and recurses into children.
    fn do_execute(&mut self, part: PartitionId) -> Result<()>;

    /// Produces the next row, or `None` once exhausted.
    fn do_next(&mut self) -> Result<Option<Row>>;

    /// Final aggregate values, available after the node is drained.
    fn aggregates(&self) -> Option<Vec<Value>> {
        None
    }

    /// Starts a partition run.
    fn execute(&mut self, part: PartitionId) -> Result<()> {
        if self.killed() {
            return Err(LookupError::PlanKilled);
        }
        self.do_execute(part)
    }

    /// Pulls one row.
    fn next(&mut self) -> Result<Option<Row>> {
        if self.killed() {
            return Err(LookupError::PlanKilled);
        }
        self.do_next()
    }
}

/// Boxed execution node borrowing its plan.
pub type BoxExecNode<'a> = Box<dyn ExecNode + 'a>;

/// Read-only plan tree.
#[derive(Clone, Debug)]
pub enum PlanNode {
    /// Tag index scan.
    VertexScan(IndexScanPlan),
    /// Edge index scan.
    EdgeScan(IndexScanPlan),
    /// Expression filter.
    Selection(SelectionPlan),
    /// Column reshaping.
    Projection(ProjectionPlan),
    /// Union of children with duplicate removal.
    Dedup(DedupPlan),
    /// Offset and limit.
    Limit(LimitPlan),
    /// Ordered offset and limit.
    TopN(TopNPlan),
    /// Pass-through statistics.
    Aggregate(AggregatePlan),
}

impl PlanNode {
    /// Negotiates columns through the tree. Must be called exactly once,
    /// before [`PlanNode::instantiate`].
    pub fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        match self {
            PlanNode::VertexScan(p) | PlanNode::EdgeScan(p) => p.init(ctx),
            PlanNode::Selection(p) => p.init(ctx),
            PlanNode::Projection(p) => p.init(ctx),
            PlanNode::Dedup(p) => p.init(ctx),
            PlanNode::Limit(p) => p.init(ctx),
            PlanNode::TopN(p) => p.init(ctx),
            PlanNode::Aggregate(p) => p.init(ctx),
        }
    }

    /// Builds a fresh execution tree borrowing this plan.
    pub fn instantiate<'a>(&'a self, rt: &RuntimeContext<'a>) -> BoxExecNode<'a> {
        match self {
            PlanNode::VertexScan(p) | PlanNode::EdgeScan(p) => p.instantiate(rt),
            PlanNode::Selection(p) => p.instantiate(rt),
            PlanNode::Projection(p) => p.instantiate(rt),
            PlanNode::Dedup(p) => p.instantiate(rt),
            PlanNode::Limit(p) => p.instantiate(rt),
            PlanNode::TopN(p) => p.instantiate(rt),
            PlanNode::Aggregate(p) => p.instantiate(rt),
        }
    }

    /// One-line description of this node.
    pub fn identify(&self) -> String {
        match self {
            PlanNode::VertexScan(p) => format!("IndexVertexScanNode({})", p.describe()),
            PlanNode::EdgeScan(p) => format!("IndexEdgeScanNode({})", p.describe()),
            PlanNode::Selection(p) => p.identify(),
            PlanNode::Projection(p) => p.identify(),
            PlanNode::Dedup(p) => p.identify(),
            PlanNode::Limit(p) => p.identify(),
            PlanNode::TopN(p) => p.identify(),
            PlanNode::Aggregate(p) => p.identify(),
        }
    }

    /// Direct children.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::VertexScan(_) | PlanNode::EdgeScan(_) => Vec::new(),
            PlanNode::Selection(p) => vec![p.child()],
            PlanNode::Projection(p) => vec![p.child()],
            PlanNode::Dedup(p) => p.children().iter().collect(),
            PlanNode::Limit(p) => vec![p.child()],
            PlanNode::TopN(p) => vec![p.child()],
            PlanNode::Aggregate(p) => vec![p.child()],
        }
    }

    /// Indented rendering of the whole tree.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(0, &mut out);
        out
    }

    fn explain_into(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.identify());
        out.push('\n');
        for child in self.children() {
            child.explain_into(depth + 1, out);
        }
    }
}
