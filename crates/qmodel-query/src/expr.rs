//! Expression tree for building queries.
//!
//! Arithmetic and bit operators are overloaded through `std::ops`, so
//! `col("price") * lit(1.1)` builds a [`Expr::BinOp`]; comparisons, which
//! cannot be overloaded to return a value, use the method forms (`gt`,
//! `eq`, …) with identical semantics.

use std::ops;

use qmodel_core::Value;

/// Higher-order operator lifting an aggregate over a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adverb {
    Each,
    Peach,
}

impl Adverb {
    pub const fn as_str(self) -> &'static str {
        match self {
            Adverb::Each => "each",
            Adverb::Peach => "peach",
        }
    }
}

/// One node of the query expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare column reference.
    Column(String),
    /// Literal value rendered in server syntax.
    Literal(Value),
    /// Binary operation, always parenthesized on output.
    BinOp {
        op: &'static str,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Unary operation (`neg`, `not`).
    Unary {
        op: &'static str,
        operand: Box<Expr>,
    },
    /// Application of a named function: `f[a;b]`.
    Call { func: String, args: Vec<Expr> },
    /// Aggregate over a column; `None` means row count (`count i`).
    Aggregate {
        func: &'static str,
        column: Option<Box<Expr>>,
    },
    /// Adverb wrapper over an aggregate. Wrapping twice is rejected at
    /// compile time; the serialized form would be ambiguous.
    Adverbed { adverb: Adverb, inner: Box<Expr> },
    /// Bucket rounding: `(n xbar x)`.
    Xbar { step: Box<Expr>, column: Box<Expr> },
    /// Inline per-group aggregate in a predicate: `((f;c) fby g)`.
    Fby {
        agg: String,
        column: Box<Expr>,
        group: Box<Expr>,
    },
    /// Range test: `(c within (lo;hi))`.
    Within {
        column: Box<Expr>,
        lo: Box<Expr>,
        hi: Box<Expr>,
    },
    /// Pattern match: `(c like "p")`.
    Like { column: Box<Expr>, pattern: String },
    /// Membership test: `(c in (v1;v2;…))`.
    In { column: Box<Expr>, values: Vec<Value> },
    /// Ordering directive: `asc c` / `desc c`.
    Sort { descending: bool, column: Box<Expr> },
}

/// Bare column reference.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

/// Literal expression.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Expr::Literal(Value::Bool(v))
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        Expr::Literal(Value::Int(v))
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::Literal(Value::Long(v))
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Literal(Value::Float(v))
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::Literal(Value::Symbol(v.to_string()))
    }
}

impl Expr {
    fn bin(op: &'static str, lhs: Expr, rhs: Expr) -> Expr {
        Expr::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    // ---- comparisons (method form) ----

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        Expr::bin(">", self, other.into())
    }

    pub fn ge(self, other: impl Into<Expr>) -> Expr {
        Expr::bin(">=", self, other.into())
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        Expr::bin("<", self, other.into())
    }

    pub fn le(self, other: impl Into<Expr>) -> Expr {
        Expr::bin("<=", self, other.into())
    }

    /// Equality; renders with the server's `=`.
    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        Expr::bin("=", self, other.into())
    }

    /// Inequality; renders with the server's `<>`.
    pub fn ne(self, other: impl Into<Expr>) -> Expr {
        Expr::bin("<>", self, other.into())
    }

    // ---- logic ----

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        Expr::bin("&", self, other.into())
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        Expr::bin("|", self, other.into())
    }

    pub fn not(self) -> Expr {
        Expr::Unary {
            op: "not",
            operand: Box::new(self),
        }
    }

    pub fn neg(self) -> Expr {
        Expr::Unary {
            op: "neg",
            operand: Box::new(self),
        }
    }

    /// Modulo; renders as the infix word form `(a mod b)`.
    pub fn modulo(self, other: impl Into<Expr>) -> Expr {
        Expr::bin("mod", self, other.into())
    }

    // ---- predicates ----

    /// `(self within (lo;hi))`.
    pub fn within(self, lo: impl Into<Expr>, hi: impl Into<Expr>) -> Expr {
        Expr::Within {
            column: Box::new(self),
            lo: Box::new(lo.into()),
            hi: Box::new(hi.into()),
        }
    }

    /// `(self like "pattern")`.
    pub fn like(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            column: Box::new(self),
            pattern: pattern.into(),
        }
    }

    /// `(self in (v1;v2;…))`.
    pub fn in_(self, values: impl IntoIterator<Item = Value>) -> Expr {
        Expr::In {
            column: Box::new(self),
            values: values.into_iter().collect(),
        }
    }

    // ---- ordering ----

    pub fn asc(self) -> Expr {
        Expr::Sort {
            descending: false,
            column: Box::new(self),
        }
    }

    pub fn desc(self) -> Expr {
        Expr::Sort {
            descending: true,
            column: Box::new(self),
        }
    }

    // ---- adverbs ----

    /// Lift an aggregate over each group element: `f c each`.
    pub fn each(self) -> Expr {
        Expr::Adverbed {
            adverb: Adverb::Each,
            inner: Box::new(self),
        }
    }

    /// Parallel variant: `f c peach`.
    pub fn peach(self) -> Expr {
        Expr::Adverbed {
            adverb: Adverb::Peach,
            inner: Box::new(self),
        }
    }

    /// Collect every column name referenced in the tree.
    pub fn columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => out.push(name),
            Expr::Literal(_) => {}
            Expr::BinOp { lhs, rhs, .. } => {
                lhs.columns(out);
                rhs.columns(out);
            }
            Expr::Unary { operand, .. } => operand.columns(out),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.columns(out);
                }
            }
            Expr::Aggregate { column, .. } => {
                if let Some(c) = column {
                    c.columns(out);
                }
            }
            Expr::Adverbed { inner, .. } => inner.columns(out),
            Expr::Xbar { step, column } => {
                step.columns(out);
                column.columns(out);
            }
            Expr::Fby { column, group, .. } => {
                column.columns(out);
                group.columns(out);
            }
            Expr::Within { column, lo, hi } => {
                column.columns(out);
                lo.columns(out);
                hi.columns(out);
            }
            Expr::Like { column, .. } => column.columns(out),
            Expr::In { column, .. } => column.columns(out),
            Expr::Sort { column, .. } => column.columns(out),
        }
    }
}

// ---- overloadable surface ----

impl<T: Into<Expr>> ops::Add<T> for Expr {
    type Output = Expr;
    fn add(self, rhs: T) -> Expr {
        Expr::bin("+", self, rhs.into())
    }
}

impl<T: Into<Expr>> ops::Sub<T> for Expr {
    type Output = Expr;
    fn sub(self, rhs: T) -> Expr {
        Expr::bin("-", self, rhs.into())
    }
}

impl<T: Into<Expr>> ops::Mul<T> for Expr {
    type Output = Expr;
    fn mul(self, rhs: T) -> Expr {
        Expr::bin("*", self, rhs.into())
    }
}

/// Division maps to the server's `%` operator; numeric coercion is left to
/// the server.
impl<T: Into<Expr>> ops::Div<T> for Expr {
    type Output = Expr;
    fn div(self, rhs: T) -> Expr {
        Expr::bin("%", self, rhs.into())
    }
}

impl<T: Into<Expr>> ops::Rem<T> for Expr {
    type Output = Expr;
    fn rem(self, rhs: T) -> Expr {
        self.modulo(rhs)
    }
}

impl<T: Into<Expr>> ops::BitAnd<T> for Expr {
    type Output = Expr;
    fn bitand(self, rhs: T) -> Expr {
        self.and(rhs)
    }
}

impl<T: Into<Expr>> ops::BitOr<T> for Expr {
    type Output = Expr;
    fn bitor(self, rhs: T) -> Expr {
        self.or(rhs)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::neg(self)
    }
}

impl ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::not(self)
    }
}

// ---- aggregate constructors ----

fn agg(func: &'static str, column: Expr) -> Expr {
    Expr::Aggregate {
        func,
        column: Some(Box::new(column)),
    }
}

pub fn avg(column: Expr) -> Expr {
    agg("avg", column)
}

pub fn sum(column: Expr) -> Expr {
    agg("sum", column)
}

pub fn min(column: Expr) -> Expr {
    agg("min", column)
}

pub fn max(column: Expr) -> Expr {
    agg("max", column)
}

pub fn first(column: Expr) -> Expr {
    agg("first", column)
}

pub fn last(column: Expr) -> Expr {
    agg("last", column)
}

pub fn med(column: Expr) -> Expr {
    agg("med", column)
}

pub fn dev(column: Expr) -> Expr {
    agg("dev", column)
}

pub fn var(column: Expr) -> Expr {
    agg("var", column)
}

/// Row count: `count i`.
pub fn count() -> Expr {
    Expr::Aggregate {
        func: "count",
        column: None,
    }
}

/// Count of a column's elements.
pub fn count_of(column: Expr) -> Expr {
    agg("count", column)
}

/// Named function application: `f[a;b]`.
pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        func: func.into(),
        args,
    }
}

/// Bucket rounding: `(step xbar column)`.
pub fn xbar(step: impl Into<Expr>, column: Expr) -> Expr {
    Expr::Xbar {
        step: Box::new(step.into()),
        column: Box::new(column),
    }
}

/// Inline per-group aggregate: `((agg;column) fby group)`.
pub fn fby(agg_name: impl Into<String>, column: Expr, group: Expr) -> Expr {
    Expr::Fby {
        agg: agg_name.into(),
        column: Box::new(column),
        group: Box::new(group),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_build_binops() {
        let e = col("price") * lit(1.1);
        assert!(matches!(e, Expr::BinOp { op: "*", .. }));

        let e = col("a") / col("b");
        assert!(matches!(e, Expr::BinOp { op: "%", .. }));

        let e = col("a") % lit(3i64);
        assert!(matches!(e, Expr::BinOp { op: "mod", .. }));

        let e = !col("flag");
        assert!(matches!(e, Expr::Unary { op: "not", .. }));
    }

    #[test]
    fn comparison_methods() {
        let e = col("price").gt(100i64);
        match e {
            Expr::BinOp { op, rhs, .. } => {
                assert_eq!(op, ">");
                assert_eq!(*rhs, Expr::Literal(Value::Long(100)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn column_collection_walks_the_tree() {
        let e = avg(col("price")).each() + xbar(lit(5i64), col("size"));
        let mut cols = Vec::new();
        e.columns(&mut cols);
        assert_eq!(cols, vec!["price", "size"]);
    }

    #[test]
    fn adverbs_wrap() {
        let e = avg(col("price")).peach();
        assert!(matches!(
            e,
            Expr::Adverbed {
                adverb: Adverb::Peach,
                ..
            }
        ));
    }
}
