//! Bounded ordering that keeps the first `offset + limit` rows by sort factors.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use super::{BoxExecNode, ExecNode, InitContext, PlanNode, RuntimeContext};
use crate::error::Result;
use crate::types::PartitionId;
use crate::value::{Row, Value};

/// Sort direction of one order-by factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One order-by factor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Column to sort on.
    pub column: String,
    /// Direction.
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Ascending on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Ascending,
        }
    }

    /// Descending on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Descending,
        }
    }
}

/// Drains its child and yields rows `[offset, offset + limit)` of the
/// ordered stream.
#[derive(Clone, Debug)]
pub struct TopNPlan {
    child: Box<PlanNode>,
    order_by: Vec<OrderBy>,
    offset: u64,
    limit: u64,
    factors: Vec<(usize, OrderDirection)>,
}

impl TopNPlan {
    /// Orders `child` by `order_by` and keeps `[offset, offset + limit)`.
    pub fn new(child: PlanNode, order_by: Vec<OrderBy>, offset: u64, limit: u64) -> Self {
        Self {
            child: Box::new(child),
            order_by,
            offset,
            limit,
            factors: Vec::new(),
        }
    }

    pub(crate) fn child(&self) -> &PlanNode {
        &self.child
    }

    pub(crate) fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        ctx.required_columns
            .extend(self.order_by.iter().map(|o| o.column.clone()));
        self.child.init(ctx)?;
        self.factors = self
            .order_by
            .iter()
            .map(|o| Ok((ctx.position(&o.column)?, o.direction)))
            .collect::<Result<_>>()?;
        Ok(())
    }

    pub(crate) fn instantiate<'a>(&'a self, rt: &RuntimeContext<'a>) -> BoxExecNode<'a> {
        Box::new(TopNExec {
            plan: self,
            rt: *rt,
            child: self.child.instantiate(rt),
            results: Vec::new(),
            pos: 0,
        })
    }

    pub(crate) fn identify(&self) -> String {
        let factors: Vec<String> = self
            .order_by
            .iter()
            .map(|o| match o.direction {
                OrderDirection::Ascending => format!("{} ASC", o.column),
                OrderDirection::Descending => format!("{} DESC", o.column),
            })
            .collect();
        format!(
            "IndexTopNNode(orderBy=[{}], offset={}, limit={})",
            factors.join(","),
            self.offset,
            self.limit
        )
    }

    fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (pos, direction) in &self.factors {
            let ord = a[*pos].cmp(&b[*pos]);
            let ord = match direction {
                OrderDirection::Ascending => ord,
                OrderDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Heap entry; the greatest entry is the first to be evicted. Arrival order
/// breaks ties so equal rows keep their child order.
struct Ranked<'a> {
    plan: &'a TopNPlan,
    seq: u64,
    row: Row,
}

impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.plan
            .compare(&self.row, &other.row)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked<'_> {}

struct TopNExec<'a> {
    plan: &'a TopNPlan,
    rt: RuntimeContext<'a>,
    child: BoxExecNode<'a>,
    results: Vec<Row>,
    pos: usize,
}

impl TopNExec<'_> {
    fn fill(&mut self, part: PartitionId) -> Result<()> {
        self.results.clear();
        self.pos = 0;
        let capacity = self.plan.offset.saturating_add(self.plan.limit);
        if self.plan.limit == 0 {
            return Ok(());
        }
        self.child.execute(part)?;
        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;
        while let Some(row) = self.child.next()? {
            let entry = Ranked {
                plan: self.plan,
                seq,
                row,
            };
            seq += 1;
            if (heap.len() as u64) < capacity {
                heap.push(entry);
            } else if let Some(mut top) = heap.peek_mut() {
                if entry < *top {
                    *top = entry;
                }
            }
        }
        self.results = heap
            .into_sorted_vec()
            .into_iter()
            .skip(self.plan.offset as usize)
            .map(|e| e.row)
            .collect();
        Ok(())
    }
}

impl ExecNode for TopNExec<'_> {
    fn killed(&self) -> bool {
        self.rt.is_killed()
    }

    fn do_execute(&mut self, part: PartitionId) -> Result<()> {
        self.fill(part)
    }

    fn do_next(&mut self) -> Result<Option<Row>> {
        let row = self.results.get(self.pos).cloned();
        self.pos += 1;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::exec::testing::{drain, runtime, scan_plan, RowsExec};
    use crate::kv::MemStore;

    fn run(input: &[Row], factors: Vec<(usize, OrderDirection)>, offset: u64, limit: u64) -> Result<Vec<Row>> {
        let store = MemStore::new();
        let killed = AtomicBool::new(false);
        let mut plan = TopNPlan::new(scan_plan(), Vec::new(), offset, limit);
        plan.factors = factors;
        let mut exec = TopNExec {
            plan: &plan,
            rt: runtime(&store, &killed),
            child: Box::new(RowsExec::new(input, &killed)),
            results: Vec::new(),
            pos: 0,
        };
        drain(&mut exec)
    }

    fn row(a: i64, b: &str) -> Row {
        vec![Value::Int(a), Value::from(b)]
    }

    #[test]
    fn keeps_window_of_sorted_stream() -> Result<()> {
        let input: Vec<Row> = [5, 1, 4, 2, 3].iter().map(|v| row(*v, "x")).collect();
        let out = run(&input, vec![(0, OrderDirection::Ascending)], 1, 2)?;
        assert_eq!(out, vec![row(2, "x"), row(3, "x")]);
        let out = run(&input, vec![(0, OrderDirection::Descending)], 3, 10)?;
        assert_eq!(out, vec![row(2, "x"), row(1, "x")]);
        Ok(())
    }

    #[test]
    fn later_factors_break_ties() -> Result<()> {
        let input = vec![row(1, "b"), row(2, "a"), row(1, "c"), row(1, "a")];
        let factors = vec![
            (0, OrderDirection::Ascending),
            (1, OrderDirection::Descending),
        ];
        let out = run(&input, factors, 0, 3)?;
        assert_eq!(out, vec![row(1, "c"), row(1, "b"), row(1, "a")]);
        Ok(())
    }

    #[test]
    fn zero_limit_is_empty() -> Result<()> {
        let input = vec![row(1, "a")];
        assert!(run(&input, vec![(0, OrderDirection::Ascending)], 0, 0)?.is_empty());
        Ok(())
    }
}
