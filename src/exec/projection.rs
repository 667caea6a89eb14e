//! Column selection and reordering.

use super::{BoxExecNode, ExecNode, InitContext, PlanNode, RuntimeContext};
use crate::error::Result;
use crate::types::PartitionId;
use crate::value::Row;

/// Narrows and reorders child rows to a fixed column list.
#[derive(Clone, Debug)]
pub struct ProjectionPlan {
    child: Box<PlanNode>,
    columns: Vec<String>,
    positions: Vec<usize>,
}

impl ProjectionPlan {
    /// Projects `child` onto `columns`, in that order.
    pub fn new(child: PlanNode, columns: Vec<String>) -> Self {
        Self {
            child: Box::new(child),
            columns,
            positions: Vec::new(),
        }
    }

    pub(crate) fn child(&self) -> &PlanNode {
        &self.child
    }

    pub(crate) fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        let mut child_ctx = InitContext::new(self.columns.iter().cloned());
        self.child.init(&mut child_ctx)?;
        self.positions = self
            .columns
            .iter()
            .map(|c| child_ctx.position(c))
            .collect::<Result<_>>()?;
        ctx.set_return_columns(self.columns.clone());
        Ok(())
    }

    pub(crate) fn instantiate<'a>(&'a self, rt: &RuntimeContext<'a>) -> BoxExecNode<'a> {
        Box::new(ProjectionExec {
            plan: self,
            rt: *rt,
            child: self.child.instantiate(rt),
        })
    }

    pub(crate) fn identify(&self) -> String {
        format!("IndexProjectionNode(projectColumns=[{}])", self.columns.join(","))
    }
}

struct ProjectionExec<'a> {
    plan: &'a ProjectionPlan,
    rt: RuntimeContext<'a>,
    child: BoxExecNode<'a>,
}

impl ExecNode for ProjectionExec<'_> {
    fn killed(&self) -> bool {
        self.rt.is_killed()
    }

    fn do_execute(&mut self, part: PartitionId) -> Result<()> {
        self.child.execute(part)
    }

    fn do_next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.child.next()? else {
            return Ok(None);
        };
        Ok(Some(
            self.plan.positions.iter().map(|p| row[*p].clone()).collect(),
        ))
    }
}
