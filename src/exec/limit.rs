//! Offset and limit window over a child stream.

use super::{BoxExecNode, ExecNode, InitContext, PlanNode, RuntimeContext};
use crate::error::Result;
use crate::types::PartitionId;
use crate::value::Row;

/// Skips `offset` rows, then yields at most `limit` rows.
#[derive(Clone, Debug)]
pub struct LimitPlan {
    child: Box<PlanNode>,
    offset: u64,
    limit: u64,
}

impl LimitPlan {
    /// Limits `child` to rows `[offset, offset + limit)`.
    pub fn new(child: PlanNode, offset: u64, limit: u64) -> Self {
        Self {
            child: Box::new(child),
            offset,
            limit,
        }
    }

    pub(crate) fn child(&self) -> &PlanNode {
        &self.child
    }

    pub(crate) fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        self.child.init(ctx)
    }

    pub(crate) fn instantiate<'a>(&'a self, rt: &RuntimeContext<'a>) -> BoxExecNode<'a> {
        Box::new(LimitExec {
            plan: self,
            rt: *rt,
            child: self.child.instantiate(rt),
            skipped: 0,
            produced: 0,
        })
    }

    pub(crate) fn identify(&self) -> String {
        format!("IndexLimitNode(offset={}, limit={})", self.offset, self.limit)
    }
}

struct LimitExec<'a> {
    plan: &'a LimitPlan,
    rt: RuntimeContext<'a>,
    child: BoxExecNode<'a>,
    skipped: u64,
    produced: u64,
}

impl ExecNode for LimitExec<'_> {
    fn killed(&self) -> bool {
        self.rt.is_killed()
    }

    fn do_execute(&mut self, part: PartitionId) -> Result<()> {
        self.skipped = 0;
        self.produced = 0;
        if self.plan.limit == 0 {
            return Ok(());
        }
        self.child.execute(part)
    }

    fn do_next(&mut self) -> Result<Option<Row>> {
        if self.produced >= self.plan.limit {
            return Ok(None);
        }
        while self.skipped < self.plan.offset {
            if self.child.next()?.is_none() {
                self.produced = self.plan.limit;
                return Ok(None);
            }
            self.skipped += 1;
        }
        let row = self.child.next()?;
        match row {
            Some(_) => self.produced += 1,
            None => self.produced = self.plan.limit,
        }
        Ok(row)
    }
}
