//! Row predicates pushed into scan planning.
//!
//! Predicates are built against column names and literal [`ScalarValue`]s and
//! must be bound against a table schema before use (see [`Predicate::bind`]). Binding
//! resolves column references, coerces literals to the column type and rejects
//! terms the schema cannot support. A bound predicate is then only used to
//! prune partitions; the consuming engine always re-evaluates the full filter.

mod bind;
mod eval;

use std::fmt;

pub use bind::{BindError, BoundPredicate, BoundReference};
pub use eval::PartitionEvaluator;

/// Literal values accepted by predicate operands.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    /// Represents SQL `NULL`.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
    /// Binary blob.
    Binary(Vec<u8>),
    /// Days since the Unix epoch.
    Date32(i32),
    /// Microseconds since the Unix epoch.
    TimestampMicros(i64),
}

impl ScalarValue {
    /// Returns true when the literal is the `Null` variant.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Boolean(v) => fmt::Display::fmt(v, f),
            ScalarValue::Int64(v) => fmt::Display::fmt(v, f),
            ScalarValue::Float64(v) => fmt::Display::fmt(v, f),
            ScalarValue::Utf8(v) => write!(f, "'{v}'"),
            ScalarValue::Binary(v) => write!(f, "X'{}'", v.len()),
            ScalarValue::Date32(v) => write!(f, "DATE({v})"),
            ScalarValue::TimestampMicros(v) => write!(f, "TIMESTAMP({v})"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int64(i64::from(value))
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_owned())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(value: Vec<u8>) -> Self {
        ScalarValue::Binary(value)
    }
}

/// Named column reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Column name as written by the caller.
    pub name: String,
}

impl ColumnRef {
    /// Reference the column `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Comparison operator used by binary predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// Equals (`=`).
    Equal,
    /// Not equals (`!=`).
    NotEqual,
    /// Less than (`<`).
    LessThan,
    /// Less than or equal to (`<=`).
    LessThanOrEqual,
    /// Greater than (`>`).
    GreaterThan,
    /// Greater than or equal to (`>=`).
    GreaterThanOrEqual,
}

impl ComparisonOp {
    /// Whether the operator only tests (in)equality.
    pub fn is_equality(self) -> bool {
        matches!(self, ComparisonOp::Equal | ComparisonOp::NotEqual)
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        })
    }
}

/// Recursive predicate node; leaf and branch variants coexist.
#[derive(Clone, Debug, PartialEq)]
pub enum PredicateNode {
    /// Always-true literal; matches all rows.
    True,
    /// Comparison of a column against a literal.
    Compare {
        /// Column operand.
        column: ColumnRef,
        /// Operator.
        op: ComparisonOp,
        /// Literal operand.
        value: ScalarValue,
    },
    /// Membership test against a literal list.
    InList {
        /// Column to test.
        column: ColumnRef,
        /// Literal candidates.
        list: Vec<ScalarValue>,
        /// True when representing `NOT IN`.
        negated: bool,
    },
    /// Null check (`IS NULL` / `IS NOT NULL`).
    IsNull {
        /// Column under inspection.
        column: ColumnRef,
        /// True when representing `IS NOT NULL`.
        negated: bool,
    },
    /// Logical negation.
    Not(Box<Predicate>),
    /// Conjunction over multiple predicates.
    And(Vec<Predicate>),
    /// Disjunction over multiple predicates.
    Or(Vec<Predicate>),
}

/// Unbound row predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    kind: PredicateNode,
}

impl Predicate {
    /// Wrap a node.
    #[must_use]
    pub fn from_kind(kind: PredicateNode) -> Self {
        Self { kind }
    }

    /// Returns a reference to the underlying node.
    pub fn kind(&self) -> &PredicateNode {
        &self.kind
    }

    fn compare(column: impl Into<String>, op: ComparisonOp, value: impl Into<ScalarValue>) -> Self {
        Self::from_kind(PredicateNode::Compare {
            column: ColumnRef::new(column),
            op,
            value: value.into(),
        })
    }

    /// `column = value`.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(column, ComparisonOp::Equal, value)
    }

    /// `column != value`.
    #[must_use]
    pub fn not_eq(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(column, ComparisonOp::NotEqual, value)
    }

    /// `column < value`.
    #[must_use]
    pub fn lt(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(column, ComparisonOp::LessThan, value)
    }

    /// `column <= value`.
    #[must_use]
    pub fn lt_eq(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(column, ComparisonOp::LessThanOrEqual, value)
    }

    /// `column > value`.
    #[must_use]
    pub fn gt(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(column, ComparisonOp::GreaterThan, value)
    }

    /// `column >= value`.
    #[must_use]
    pub fn gt_eq(column: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self::compare(column, ComparisonOp::GreaterThanOrEqual, value)
    }

    /// `column IN (list)`.
    #[must_use]
    pub fn in_list<I, V>(column: impl Into<String>, list: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        Self::from_kind(PredicateNode::InList {
            column: ColumnRef::new(column),
            list: list.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    /// `column IS NULL`.
    #[must_use]
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::from_kind(PredicateNode::IsNull {
            column: ColumnRef::new(column),
            negated: false,
        })
    }

    /// `column IS NOT NULL`.
    #[must_use]
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::from_kind(PredicateNode::IsNull {
            column: ColumnRef::new(column),
            negated: true,
        })
    }

    /// Logical negation of `self`.
    #[must_use]
    pub fn not(self) -> Self {
        Self::from_kind(PredicateNode::Not(Box::new(self)))
    }

    /// Conjunction of `self` and `other`, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        let mut clauses = Vec::new();
        for clause in [self, other] {
            match clause.kind {
                PredicateNode::And(mut nested) => clauses.append(&mut nested),
                other => clauses.push(Predicate::from_kind(other)),
            }
        }
        Self::from_kind(PredicateNode::And(clauses))
    }

    /// Disjunction of `self` and `other`, flattening nested disjunctions.
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        let mut clauses = Vec::new();
        for clause in [self, other] {
            match clause.kind {
                PredicateNode::Or(mut nested) => clauses.append(&mut nested),
                other => clauses.push(Predicate::from_kind(other)),
            }
        }
        Self::from_kind(PredicateNode::Or(clauses))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            PredicateNode::True => f.write_str("true"),
            PredicateNode::Compare { column, op, value } => {
                write!(f, "{} {op} {value}", column.name)
            }
            PredicateNode::InList {
                column,
                list,
                negated,
            } => {
                write!(f, "{}{} IN (", column.name, if *negated { " NOT" } else { "" })?;
                for (idx, value) in list.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    fmt::Display::fmt(value, f)?;
                }
                f.write_str(")")
            }
            PredicateNode::IsNull { column, negated } => write!(
                f,
                "{} IS {}NULL",
                column.name,
                if *negated { "NOT " } else { "" }
            ),
            PredicateNode::Not(child) => write!(f, "NOT ({child})"),
            PredicateNode::And(children) => join(f, children, " AND "),
            PredicateNode::Or(children) => join(f, children, " OR "),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            f.write_str(sep)?;
        }
        fmt::Display::fmt(child, f)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_flattens_nested_conjunctions() {
        let pred = Predicate::eq("a", 1)
            .and(Predicate::eq("b", 2))
            .and(Predicate::gt("c", 3));
        match pred.kind() {
            PredicateNode::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn display_renders_nested_predicates() {
        let pred = Predicate::eq("dt", "2024-01-01")
            .or(Predicate::is_null("dt"))
            .and(Predicate::in_list("id", [1i64, 2]).not());
        assert_eq!(
            pred.to_string(),
            "((dt = '2024-01-01' OR dt IS NULL) AND NOT (id IN (1, 2)))"
        );
    }
}
