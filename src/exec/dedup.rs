//! Ordered union of child streams with duplicate rows removed.

use rustc_hash::FxHashSet;

use super::{BoxExecNode, ExecNode, InitContext, PlanNode, RuntimeContext};
use crate::error::{LookupError, Result};
use crate::types::PartitionId;
use crate::value::{Row, Value};

/// Unions its children in order, dropping rows whose dedup key was already
/// produced during the current partition run.
#[derive(Clone, Debug)]
pub struct DedupPlan {
    children: Vec<PlanNode>,
    key_columns: Vec<String>,
    key_positions: Vec<usize>,
}

impl DedupPlan {
    /// Dedups on `key_columns`; an empty list dedups on whole rows.
    pub fn new(children: Vec<PlanNode>, key_columns: Vec<String>) -> Self {
        Self {
            children,
            key_columns,
            key_positions: Vec::new(),
        }
    }

    pub(crate) fn children(&self) -> &[PlanNode] {
        &self.children
    }

    pub(crate) fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        if self.children.is_empty() {
            return Err(LookupError::invalid("dedup without children"));
        }
        ctx.required_columns.extend(self.key_columns.iter().cloned());
        let mut produced: Option<InitContext> = None;
        for child in &mut self.children {
            let mut child_ctx = ctx.clone();
            child.init(&mut child_ctx)?;
            match &produced {
                Some(first) if first.return_columns != child_ctx.return_columns => {
                    return Err(LookupError::invalid(
                        "dedup children produce different columns",
                    ));
                }
                Some(_) => {}
                None => produced = Some(child_ctx),
            }
        }
        if let Some(first) = produced {
            *ctx = first;
        }
        self.key_positions = self
            .key_columns
            .iter()
            .map(|c| ctx.position(c))
            .collect::<Result<_>>()?;
        Ok(())
    }

    pub(crate) fn instantiate<'a>(&'a self, rt: &RuntimeContext<'a>) -> BoxExecNode<'a> {
        Box::new(DedupExec {
            plan: self,
            rt: *rt,
            children: self.children.iter().map(|c| c.instantiate(rt)).collect(),
            current: 0,
            part: PartitionId(0),
            seen: FxHashSet::default(),
        })
    }

    pub(crate) fn identify(&self) -> String {
        format!("IndexDedupNode(dedup=[{}])", self.key_columns.join(","))
    }

    fn key(&self, row: &[Value]) -> Vec<Value> {
        if self.key_positions.is_empty() {
            row.to_vec()
        } else {
            self.key_positions.iter().map(|p| row[*p].clone()).collect()
        }
    }
}

struct DedupExec<'a> {
    plan: &'a DedupPlan,
    rt: RuntimeContext<'a>,
    children: Vec<BoxExecNode<'a>>,
    current: usize,
    part: PartitionId,
    seen: FxHashSet<Vec<Value>>,
}

impl ExecNode for DedupExec<'_> {
    fn killed(&self) -> bool {
        self.rt.is_killed()
    }

    fn do_execute(&mut self, part: PartitionId) -> Result<()> {
        self.seen.clear();
        self.current = 0;
        self.part = part;
        match self.children.first_mut() {
            Some(child) => child.execute(part),
            None => Ok(()),
        }
    }

    fn do_next(&mut self) -> Result<Option<Row>> {
        while self.current < self.children.len() {
            match self.children[self.current].next()? {
                Some(row) => {
                    if self.seen.insert(self.plan.key(&row)) {
                        return Ok(Some(row));
                    }
                }
                None => {
                    self.current += 1;
                    if let Some(child) = self.children.get_mut(self.current) {
                        child.execute(self.part)?;
                    }
                }
            }
        }
        Ok(None)
    }
}
