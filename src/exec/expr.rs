//! Post-filter expressions evaluated by Selection nodes.
//!
//! Evaluation follows three-valued logic: a comparison with a NULL operand
//! yields NULL, `AND`/`OR` only propagate NULL when no operand decides the
//! result, and `NOT NULL` stays NULL. Selection keeps a row only when the
//! filter yields `Bool(true)`.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{LookupError, Result};
use crate::value::Value;

/// Binary comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CmpOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord.is_eq(),
            CmpOp::Ne => ord.is_ne(),
            CmpOp::Lt => ord.is_lt(),
            CmpOp::Le => ord.is_le(),
            CmpOp::Gt => ord.is_gt(),
            CmpOp::Ge => ord.is_ge(),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Boolean filter over the columns of a row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Value of a named column.
    Column(String),
    /// Constant.
    Literal(Value),
    /// Comparison of two operands.
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    /// Conjunction.
    And(Vec<Expr>),
    /// Disjunction.
    Or(Vec<Expr>),
    /// Negation.
    Not(Box<Expr>),
    /// True when the operand is NULL.
    IsNull(Box<Expr>),
}

impl Expr {
    /// Column reference.
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    /// `column <op> value`.
    pub fn compare(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Expr::Cmp(
            op,
            Box::new(Expr::Column(column.into())),
            Box::new(Expr::Literal(value.into())),
        )
    }

    /// Every column the expression reads.
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Literal(_) => {}
            Expr::Cmp(_, l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Expr::And(items) | Expr::Or(items) => {
                for item in items {
                    item.collect_columns(out);
                }
            }
            Expr::Not(inner) | Expr::IsNull(inner) => inner.collect_columns(out),
        }
    }

    /// Evaluates against `row`, resolving columns through `positions`.
    pub fn eval(&self, row: &[Value], positions: &FxHashMap<String, usize>) -> Result<Value> {
        match self {
            Expr::Column(name) => positions
                .get(name)
                .and_then(|pos| row.get(*pos))
                .cloned()
                .ok_or_else(|| LookupError::FieldNotFound(name.clone())),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Cmp(op, l, r) => {
                let left = l.eval(row, positions)?;
                let right = r.eval(row, positions)?;
                Ok(compare_values(*op, &left, &right))
            }
            Expr::And(items) => {
                let mut saw_null = false;
                for item in items {
                    match item.eval(row, positions)? {
                        Value::Bool(false) => return Ok(Value::Bool(false)),
                        Value::Bool(true) => {}
                        _ => saw_null = true,
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Bool(true) })
            }
            Expr::Or(items) => {
                let mut saw_null = false;
                for item in items {
                    match item.eval(row, positions)? {
                        Value::Bool(true) => return Ok(Value::Bool(true)),
                        Value::Bool(false) => {}
                        _ => saw_null = true,
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Bool(false) })
            }
            Expr::Not(inner) => Ok(match inner.eval(row, positions)? {
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::Null,
            }),
            Expr::IsNull(inner) => Ok(Value::Bool(inner.eval(row, positions)?.is_null())),
        }
    }
}

/// Ints and floats compare numerically; other kinds only compare with their
/// own kind. NaN never satisfies an ordering.
fn compare_values(op: CmpOp, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    let ord = match (left, right) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            }
        }
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        _ if std::mem::discriminant(left) == std::mem::discriminant(right) => Some(left.cmp(right)),
        _ => None,
    };
    match ord {
        Some(ord) => Value::Bool(op.holds(ord)),
        None if op == CmpOp::Ne => Value::Bool(true),
        None if op == CmpOp::Eq => Value::Bool(false),
        None => Value::Null,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => f.write_str(name),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Cmp(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Expr::And(items) | Expr::Or(items) => {
                let sep = if matches!(self, Expr::And(_)) { " AND " } else { " OR " };
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::IsNull(inner) => write!(f, "{inner} IS NULL"),
        }
    }
}
