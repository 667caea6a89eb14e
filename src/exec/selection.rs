//! Row filter over a child stream.

use rustc_hash::FxHashMap;

use super::{BoxExecNode, ExecNode, Expr, InitContext, PlanNode, RuntimeContext};
use crate::error::Result;
use crate::types::PartitionId;
use crate::value::{Row, Value};

/// Keeps rows for which the filter evaluates to `true`.
#[derive(Clone, Debug)]
pub struct SelectionPlan {
    child: Box<PlanNode>,
    filter: Expr,
    positions: FxHashMap<String, usize>,
}

impl SelectionPlan {
    /// Filters `child` by `filter`.
    pub fn new(child: PlanNode, filter: Expr) -> Self {
        Self {
            child: Box::new(child),
            filter,
            positions: FxHashMap::default(),
        }
    }

    pub(crate) fn child(&self) -> &PlanNode {
        &self.child
    }

    pub(crate) fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        ctx.required_columns.extend(self.filter.columns());
        self.child.init(ctx)?;
        self.positions = ctx.ret_col_map.clone();
        Ok(())
    }

    pub(crate) fn instantiate<'a>(&'a self, rt: &RuntimeContext<'a>) -> BoxExecNode<'a> {
        Box::new(SelectionExec {
            plan: self,
            rt: *rt,
            child: self.child.instantiate(rt),
        })
    }

    pub(crate) fn identify(&self) -> String {
        format!("IndexSelectionNode(expr={})", self.filter)
    }
}

struct SelectionExec<'a> {
    plan: &'a SelectionPlan,
    rt: RuntimeContext<'a>,
    child: BoxExecNode<'a>,
}

impl ExecNode for SelectionExec<'_> {
    fn killed(&self) -> bool {
        self.rt.is_killed()
    }

    fn do_execute(&mut self, part: PartitionId) -> Result<()> {
        self.child.execute(part)
    }

    fn do_next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.child.next()? {
            if self.plan.filter.eval(&row, &self.plan.positions)? == Value::Bool(true) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}
