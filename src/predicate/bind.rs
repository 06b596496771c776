use arrow::datatypes::{DataType, Schema, TimeUnit};
use thiserror::Error;

use super::{ComparisonOp, Predicate, PredicateNode, ScalarValue};
use crate::partition::PartitionValue;

/// Reasons a predicate cannot be bound against a schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// Column is not part of the schema.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    /// Literal cannot be represented in the column type.
    #[error("Type mismatch for column '{column}': cannot bind {literal} to {expected:?}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Column type.
        expected: DataType,
        /// Rendered literal.
        literal: String,
    },
    /// Operator not supported for the column type.
    #[error("Unsupported operator {op} for column '{column}' of type {data_type:?}")]
    UnsupportedOperator {
        /// Column name.
        column: String,
        /// Column type.
        data_type: DataType,
        /// Rendered operator.
        op: String,
    },
    /// Comparison against a `NULL` literal.
    #[error("Comparison with NULL is not allowed for column '{0}'; use IS NULL/IS NOT NULL")]
    NullComparison(String),
    /// Structurally malformed predicate.
    #[error("Invalid arity for {op}: expected {expected}, got {got}")]
    InvalidArity {
        /// Operator name.
        op: &'static str,
        /// Expected child count.
        expected: &'static str,
        /// Actual child count.
        got: usize,
    },
}

impl BindError {
    /// Whether the predicate itself is malformed, independently of any schema.
    pub fn is_structural(&self) -> bool {
        matches!(self, BindError::InvalidArity { .. })
    }
}

/// Column resolved against a schema.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundReference {
    /// Column name as spelled in the schema.
    pub name: String,
    /// Position of the column in the schema.
    pub index: usize,
    /// Column type.
    pub data_type: DataType,
}

/// Predicate whose columns are resolved and whose literals are coerced to the
/// column types.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundPredicate {
    /// Always true.
    True,
    /// Comparison of a column against a typed literal.
    Compare {
        /// Resolved column.
        column: BoundReference,
        /// Operator.
        op: ComparisonOp,
        /// Coerced literal.
        value: PartitionValue,
    },
    /// Membership test.
    InList {
        /// Resolved column.
        column: BoundReference,
        /// Coerced literals.
        list: Vec<PartitionValue>,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// Null check.
    IsNull {
        /// Resolved column.
        column: BoundReference,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
    /// Negation.
    Not(Box<BoundPredicate>),
    /// Conjunction.
    And(Vec<BoundPredicate>),
    /// Disjunction.
    Or(Vec<BoundPredicate>),
}

impl Predicate {
    /// Resolve this predicate against `schema`.
    ///
    /// Structural defects are reported before any column is resolved, so a
    /// malformed predicate fails the same way whatever its child order.
    pub fn bind(&self, schema: &Schema, case_sensitive: bool) -> Result<BoundPredicate, BindError> {
        self.check_structure()?;
        self.bind_node(schema, case_sensitive)
    }

    fn check_structure(&self) -> Result<(), BindError> {
        match self.kind() {
            PredicateNode::InList { list, .. } if list.is_empty() => Err(empty_operands("in")),
            PredicateNode::And(children) if children.is_empty() => Err(empty_operands("and")),
            PredicateNode::Or(children) if children.is_empty() => Err(empty_operands("or")),
            PredicateNode::And(children) | PredicateNode::Or(children) => {
                children.iter().try_for_each(Predicate::check_structure)
            }
            PredicateNode::Not(child) => child.check_structure(),
            PredicateNode::True
            | PredicateNode::Compare { .. }
            | PredicateNode::InList { .. }
            | PredicateNode::IsNull { .. } => Ok(()),
        }
    }

    fn bind_node(&self, schema: &Schema, case_sensitive: bool) -> Result<BoundPredicate, BindError> {
        match self.kind() {
            PredicateNode::True => Ok(BoundPredicate::True),
            PredicateNode::Compare { column, op, value } => {
                let column = resolve_column(schema, &column.name, case_sensitive)?;
                if value.is_null() {
                    return Err(BindError::NullComparison(column.name));
                }
                if !op.is_equality() && !is_orderable(&column.data_type) {
                    return Err(BindError::UnsupportedOperator {
                        op: op.to_string(),
                        data_type: column.data_type,
                        column: column.name,
                    });
                }
                let value = coerce_literal(&column, value)?;
                Ok(BoundPredicate::Compare {
                    column,
                    op: *op,
                    value,
                })
            }
            PredicateNode::InList {
                column,
                list,
                negated,
            } => {
                let column = resolve_column(schema, &column.name, case_sensitive)?;
                let mut values = Vec::with_capacity(list.len());
                for literal in list {
                    if literal.is_null() {
                        return Err(BindError::NullComparison(column.name));
                    }
                    values.push(coerce_literal(&column, literal)?);
                }
                Ok(BoundPredicate::InList {
                    column,
                    list: values,
                    negated: *negated,
                })
            }
            PredicateNode::IsNull { column, negated } => {
                let column = resolve_column(schema, &column.name, case_sensitive)?;
                Ok(BoundPredicate::IsNull {
                    column,
                    negated: *negated,
                })
            }
            PredicateNode::Not(child) => Ok(BoundPredicate::Not(Box::new(
                child.bind_node(schema, case_sensitive)?,
            ))),
            PredicateNode::And(children) => children
                .iter()
                .map(|child| child.bind_node(schema, case_sensitive))
                .collect::<Result<Vec<_>, _>>()
                .map(BoundPredicate::And),
            PredicateNode::Or(children) => children
                .iter()
                .map(|child| child.bind_node(schema, case_sensitive))
                .collect::<Result<Vec<_>, _>>()
                .map(BoundPredicate::Or),
        }
    }
}

fn empty_operands(op: &'static str) -> BindError {
    BindError::InvalidArity {
        op,
        expected: "at least 1",
        got: 0,
    }
}

fn resolve_column(
    schema: &Schema,
    name: &str,
    case_sensitive: bool,
) -> Result<BoundReference, BindError> {
    let found = schema.fields().iter().enumerate().find(|(_, field)| {
        if case_sensitive {
            field.name() == name
        } else {
            field.name().eq_ignore_ascii_case(name)
        }
    });
    match found {
        Some((index, field)) => Ok(BoundReference {
            name: field.name().clone(),
            index,
            data_type: field.data_type().clone(),
        }),
        None => Err(BindError::UnknownColumn(name.to_string())),
    }
}

fn is_orderable(data_type: &DataType) -> bool {
    !matches!(data_type, DataType::Boolean)
}

// Numeric literals convert only when exact: a rounded literal can flip a
// strict comparison and prune a matching partition.
fn exact_f32_from_f64(value: f64) -> Option<f32> {
    let narrowed = value as f32;
    (f64::from(narrowed) == value || value.is_nan()).then_some(narrowed)
}

fn coerce_literal(
    column: &BoundReference,
    literal: &ScalarValue,
) -> Result<PartitionValue, BindError> {
    let coerced = match (&column.data_type, literal) {
        (DataType::Boolean, ScalarValue::Boolean(v)) => Some(PartitionValue::Boolean(*v)),
        (DataType::Int32, ScalarValue::Int64(v)) => {
            i32::try_from(*v).ok().map(PartitionValue::Int32)
        }
        (DataType::Int64, ScalarValue::Int64(v)) => Some(PartitionValue::Int64(*v)),
        (DataType::Float32, ScalarValue::Float64(v)) => {
            exact_f32_from_f64(*v).map(PartitionValue::float32)
        }
        (DataType::Float32, ScalarValue::Int64(v)) => {
            let narrowed = *v as f32;
            (narrowed as i128 == i128::from(*v)).then(|| PartitionValue::float32(narrowed))
        }
        (DataType::Float64, ScalarValue::Float64(v)) => Some(PartitionValue::float64(*v)),
        (DataType::Float64, ScalarValue::Int64(v)) => {
            let widened = *v as f64;
            (widened as i128 == i128::from(*v)).then(|| PartitionValue::float64(widened))
        }
        (DataType::Utf8 | DataType::LargeUtf8, ScalarValue::Utf8(v)) => {
            Some(PartitionValue::Utf8(v.clone()))
        }
        (DataType::Binary | DataType::LargeBinary, ScalarValue::Binary(v)) => {
            Some(PartitionValue::Binary(v.clone()))
        }
        (DataType::Date32, ScalarValue::Date32(v)) => Some(PartitionValue::Date32(*v)),
        (DataType::Timestamp(TimeUnit::Microsecond, _), ScalarValue::TimestampMicros(v)) => {
            Some(PartitionValue::TimestampMicros(*v))
        }
        _ => None,
    };
    coerced.ok_or_else(|| BindError::TypeMismatch {
        column: column.name.clone(),
        expected: column.data_type.clone(),
        literal: literal.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::Field;

    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("dt", DataType::Utf8, false),
            Field::new("deleted", DataType::Boolean, true),
        ])
    }

    #[test]
    fn binds_and_coerces_literals() {
        let bound = Predicate::eq("id", 7).bind(&schema(), true).expect("bind");
        match bound {
            BoundPredicate::Compare { column, value, .. } => {
                assert_eq!(column.index, 0);
                assert_eq!(value, PartitionValue::Int32(7));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_column_fails_to_bind() {
        let err = Predicate::eq("missing", 1)
            .bind(&schema(), true)
            .expect_err("unknown column");
        assert_eq!(err, BindError::UnknownColumn("missing".to_string()));
        assert!(!err.is_structural());
    }

    #[test]
    fn case_insensitive_binding_uses_schema_spelling() {
        assert!(Predicate::eq("DT", "x").bind(&schema(), true).is_err());
        let bound = Predicate::eq("DT", "x").bind(&schema(), false).expect("bind");
        match bound {
            BoundPredicate::Compare { column, .. } => assert_eq!(column.name, "dt"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn type_mismatch_and_overflow_are_rejected() {
        assert!(matches!(
            Predicate::eq("dt", 3).bind(&schema(), true),
            Err(BindError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Predicate::eq("id", i64::MAX).bind(&schema(), true),
            Err(BindError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn ordering_on_boolean_and_null_literals_rejected() {
        assert!(matches!(
            Predicate::lt("deleted", true).bind(&schema(), true),
            Err(BindError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            Predicate::eq("dt", ScalarValue::Null).bind(&schema(), true),
            Err(BindError::NullComparison(_))
        ));
    }

    #[test]
    fn numeric_literals_bind_only_when_exact() {
        let schema = Schema::new(vec![
            Field::new("f", DataType::Float32, false),
            Field::new("d", DataType::Float64, false),
        ]);
        let bound = |predicate: Predicate| predicate.bind(&schema, true);

        assert!(matches!(
            bound(Predicate::lt("f", 16_777_217i64)),
            Err(BindError::TypeMismatch { .. })
        ));
        assert!(matches!(
            bound(Predicate::lt("f", 0.1f64)),
            Err(BindError::TypeMismatch { .. })
        ));
        assert!(matches!(
            bound(Predicate::lt("d", (1i64 << 53) + 1)),
            Err(BindError::TypeMismatch { .. })
        ));

        match bound(Predicate::eq("f", 16_777_216i64)).expect("exact") {
            BoundPredicate::Compare { value, .. } => {
                assert_eq!(value, PartitionValue::float32(16_777_216.0))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(bound(Predicate::eq("f", 0.5f64)).is_ok());
        assert!(bound(Predicate::eq("d", 1i64 << 53)).is_ok());
    }

    #[test]
    fn structural_errors_do_not_depend_on_child_order() {
        let malformed = || Predicate::in_list("dt", Vec::<&str>::new());
        let unknown = || Predicate::eq("nope", 1);
        for predicate in [
            unknown().or(malformed()),
            malformed().or(unknown()),
            unknown().and(malformed()),
            malformed().not().and(unknown()),
        ] {
            let err = predicate.bind(&schema(), true).expect_err("malformed");
            assert!(err.is_structural(), "{predicate}: {err}");
        }
    }

    #[test]
    fn empty_in_list_is_structural() {
        let err = Predicate::in_list("id", Vec::<i64>::new())
            .bind(&schema(), true)
            .expect_err("empty list");
        assert!(err.is_structural());
    }
}
