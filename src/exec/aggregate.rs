//! SUM, COUNT, MAX and MIN folded over the rows passing through.
//!
//! Partials are reported per partition and merged by the lookup processor.

use serde::{Deserialize, Serialize};

use super::{BoxExecNode, ExecNode, InitContext, PlanNode, RuntimeContext};
use crate::error::Result;
use crate::types::PartitionId;
use crate::value::{Row, Value};

/// Statistic kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatKind {
    /// Numeric sum; NULLs are ignored.
    Sum,
    /// Number of rows.
    Count,
    /// Largest non-NULL value.
    Max,
    /// Smallest non-NULL value.
    Min,
}

/// One statistic requested by a lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatProp {
    /// Name of the statistic in the result.
    pub alias: String,
    /// Column the statistic reads.
    pub column: String,
    /// Statistic kind.
    pub kind: StatKind,
}

impl StatProp {
    /// Statistic `kind` over `column`, reported as `alias`.
    pub fn new(alias: impl Into<String>, column: impl Into<String>, kind: StatKind) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
            kind,
        }
    }

    /// Value before any row is seen.
    pub fn initial(&self) -> Value {
        match self.kind {
            StatKind::Sum | StatKind::Count => Value::Int(0),
            StatKind::Max | StatKind::Min => Value::Null,
        }
    }

    /// Folds one row's `value` into `acc`.
    pub fn accumulate(&self, acc: &mut Value, value: &Value) {
        match self.kind {
            StatKind::Count => {
                if let Value::Int(n) = acc {
                    *n += 1;
                }
            }
            StatKind::Sum => add(acc, value),
            StatKind::Max => {
                if !value.is_null() && (acc.is_null() || value > &*acc) {
                    *acc = value.clone();
                }
            }
            StatKind::Min => {
                if !value.is_null() && (acc.is_null() || value < &*acc) {
                    *acc = value.clone();
                }
            }
        }
    }

    /// Combines two partial results of this statistic.
    pub fn merge(&self, acc: &mut Value, partial: &Value) {
        match self.kind {
            StatKind::Count | StatKind::Sum => add(acc, partial),
            StatKind::Max | StatKind::Min => self.accumulate(acc, partial),
        }
    }
}

fn add(acc: &mut Value, value: &Value) {
    *acc = match (&*acc, value) {
        (_, Value::Null) => return,
        (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => Value::Float(a + b),
            _ => return,
        },
    };
}

/// Passes rows through unchanged while folding statistics over them.
#[derive(Clone, Debug)]
pub struct AggregatePlan {
    child: Box<PlanNode>,
    stats: Vec<StatProp>,
    positions: Vec<usize>,
}

impl AggregatePlan {
    /// Collects `stats` over the rows of `child`.
    pub fn new(child: PlanNode, stats: Vec<StatProp>) -> Self {
        Self {
            child: Box::new(child),
            stats,
            positions: Vec::new(),
        }
    }

    /// Configured statistics.
    pub fn stats(&self) -> &[StatProp] {
        &self.stats
    }

    pub(crate) fn child(&self) -> &PlanNode {
        &self.child
    }

    pub(crate) fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        ctx.required_columns
            .extend(self.stats.iter().map(|s| s.column.clone()));
        self.child.init(ctx)?;
        self.positions = self
            .stats
            .iter()
            .map(|s| ctx.position(&s.column))
            .collect::<Result<_>>()?;
        Ok(())
    }

    pub(crate) fn instantiate<'a>(&'a self, rt: &RuntimeContext<'a>) -> BoxExecNode<'a> {
        Box::new(AggregateExec {
            plan: self,
            rt: *rt,
            child: self.child.instantiate(rt),
            values: self.initial(),
        })
    }

    pub(crate) fn identify(&self) -> String {
        let stats: Vec<String> = self
            .stats
            .iter()
            .map(|s| format!("{}={:?}({})", s.alias, s.kind, s.column))
            .collect();
        format!("IndexAggregateNode(stats=[{}])", stats.join(","))
    }

    fn initial(&self) -> Vec<Value> {
        self.stats.iter().map(StatProp::initial).collect()
    }
}

struct AggregateExec<'a> {
    plan: &'a AggregatePlan,
    rt: RuntimeContext<'a>,
    child: BoxExecNode<'a>,
    values: Vec<Value>,
}

impl ExecNode for AggregateExec<'_> {
    fn killed(&self) -> bool {
        self.rt.is_killed()
    }

    fn do_execute(&mut self, part: PartitionId) -> Result<()> {
        self.values = self.plan.initial();
        self.child.execute(part)
    }

    fn do_next(&mut self) -> Result<Option<Row>> {
        let row = self.child.next()?;
        if let Some(row) = &row {
            for ((stat, pos), acc) in self
                .plan
                .stats
                .iter()
                .zip(&self.plan.positions)
                .zip(&mut self.values)
            {
                stat.accumulate(acc, &row[*pos]);
            }
        }
        Ok(row)
    }

    fn aggregates(&self) -> Option<Vec<Value>> {
        Some(self.values.clone())
    }
}
