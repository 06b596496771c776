use std::cmp::Ordering;

use super::{BoundPredicate, ComparisonOp};
use crate::partition::{PartitionKey, PartitionSpec, PartitionValue};

/// Conservative evaluator answering "can any row of this partition match?".
///
/// Only terms over identity partition columns can rule a partition out. Every
/// other term is unknown and keeps the partition, so pruning never drops data
/// the predicate could still select.
#[derive(Debug, Clone)]
pub struct PartitionEvaluator {
    predicate: BoundPredicate,
    columns: Vec<String>,
}

impl PartitionEvaluator {
    /// Build an evaluator for `predicate` over partitions of `spec`.
    pub fn new(spec: &PartitionSpec, predicate: BoundPredicate) -> Self {
        let columns = spec
            .fields()
            .iter()
            .filter(|field| field.transform.is_identity())
            .map(|field| field.source.clone())
            .collect();
        Self { predicate, columns }
    }

    /// Whether rows in `partition` may satisfy the predicate.
    pub fn may_match(&self, partition: &PartitionKey) -> bool {
        self.eval(&self.predicate, partition) != Some(false)
    }

    fn value_of<'a>(&self, name: &str, partition: &'a PartitionKey) -> Option<&'a PartitionValue> {
        let pos = self.columns.iter().position(|column| column == name)?;
        partition.get(pos)
    }

    // `None` means the outcome cannot be decided from partition values alone.
    fn eval(&self, predicate: &BoundPredicate, partition: &PartitionKey) -> Option<bool> {
        match predicate {
            BoundPredicate::True => Some(true),
            BoundPredicate::Compare { column, op, value } => {
                let actual = self.value_of(&column.name, partition)?;
                if actual.is_null() {
                    return Some(false);
                }
                Some(test(*op, actual.cmp(value)))
            }
            BoundPredicate::InList {
                column,
                list,
                negated,
            } => {
                let actual = self.value_of(&column.name, partition)?;
                if actual.is_null() {
                    return Some(false);
                }
                Some(list.contains(actual) != *negated)
            }
            BoundPredicate::IsNull { column, negated } => {
                let actual = self.value_of(&column.name, partition)?;
                Some(actual.is_null() != *negated)
            }
            BoundPredicate::Not(child) => self.eval(child, partition).map(|v| !v),
            BoundPredicate::And(children) => {
                let mut outcome = Some(true);
                for child in children {
                    match self.eval(child, partition) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => outcome = None,
                    }
                }
                outcome
            }
            BoundPredicate::Or(children) => {
                let mut outcome = Some(false);
                for child in children {
                    match self.eval(child, partition) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => outcome = None,
                    }
                }
                outcome
            }
        }
    }
}

fn test(op: ComparisonOp, ordering: Ordering) -> bool {
    match op {
        ComparisonOp::Equal => ordering == Ordering::Equal,
        ComparisonOp::NotEqual => ordering != Ordering::Equal,
        ComparisonOp::LessThan => ordering == Ordering::Less,
        ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
        ComparisonOp::GreaterThan => ordering == Ordering::Greater,
        ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::predicate::Predicate;

    fn evaluator(predicate: Predicate) -> PartitionEvaluator {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("dt", DataType::Utf8, true),
        ]);
        let bound = predicate.bind(&schema, true).expect("bind");
        PartitionEvaluator::new(&PartitionSpec::identity(["dt"]), bound)
    }

    fn day(value: &str) -> PartitionKey {
        PartitionKey::from_iter([value])
    }

    #[test]
    fn equality_prunes_other_partitions() {
        let eval = evaluator(Predicate::eq("dt", "2024-01-01"));
        assert!(eval.may_match(&day("2024-01-01")));
        assert!(!eval.may_match(&day("2024-01-02")));
    }

    #[test]
    fn non_partition_terms_never_prune() {
        let eval = evaluator(Predicate::eq("id", 1i64));
        assert!(eval.may_match(&day("2024-01-01")));

        let eval = evaluator(Predicate::eq("id", 1i64).not());
        assert!(eval.may_match(&day("2024-01-01")));
    }

    #[test]
    fn conjunction_with_unknown_still_prunes_on_false() {
        let eval = evaluator(Predicate::eq("id", 1i64).and(Predicate::gt("dt", "2024-01-05")));
        assert!(!eval.may_match(&day("2024-01-01")));
        assert!(eval.may_match(&day("2024-01-09")));

        let eval = evaluator(Predicate::eq("id", 1i64).or(Predicate::gt("dt", "2024-01-05")));
        assert!(eval.may_match(&day("2024-01-01")));
    }

    #[test]
    fn null_partitions_follow_sql_semantics() {
        let null = PartitionKey::new(vec![PartitionValue::Null]);
        assert!(!evaluator(Predicate::eq("dt", "x")).may_match(&null));
        assert!(evaluator(Predicate::is_null("dt")).may_match(&null));
        assert!(!evaluator(Predicate::is_not_null("dt")).may_match(&null));
        assert!(!evaluator(Predicate::in_list("dt", ["x", "y"])).may_match(&null));
    }
}
