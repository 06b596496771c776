//! Merge-on-read scan planning.
//!
//! Planning binds the scan filters against the table schema, loads one
//! point-in-time view of both sides, prunes partitions and groups the
//! surviving files per partition. For every partition the plan reads all
//! BASE files and only the CHANGE files whose transaction id is above the
//! partition watermark; anything at or below it is already folded into BASE.
//!
//! All I/O happens in [`KeyedTableScan::plan_tasks`]. The returned
//! [`ScanPlan`] is a pure value: its task sequence can be iterated any number
//! of times and always yields the same tasks.

mod packing;
mod task;

use std::{collections::BTreeMap, sync::Arc, time::Instant};

pub use task::{CombinedScanTask, FileScanTask, KeyedTableScanTask, ScanStatistics};

use self::packing::PackingIter;
use crate::{
    error::{Error, Result},
    id::SnapshotId,
    observability::{log_debug, log_info},
    option::ScanOptions,
    partition::PartitionKey,
    predicate::{BoundPredicate, PartitionEvaluator, Predicate, PredicateNode},
    table::{KeyedTable, TableView},
};

/// Builder of a merge-on-read scan over a [`KeyedTable`].
#[derive(Debug, Clone)]
pub struct KeyedTableScan {
    table: KeyedTable,
    filters: Vec<Predicate>,
    options: ScanOptions,
}

impl KeyedTableScan {
    pub(crate) fn new(table: KeyedTable) -> Self {
        let options = ScanOptions::from_properties(table.metadata().properties());
        Self {
            table,
            filters: Vec::new(),
            options,
        }
    }

    /// Add a filter; repeated calls are AND-combined.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Replace the planning options derived from the table properties.
    #[must_use]
    pub fn options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Plan the scan.
    ///
    /// Filter terms that do not bind against the schema are dropped; a
    /// structurally malformed filter fails with [`Error::Bind`]. Any failure
    /// loading the table view fails the whole call, no partial plan is
    /// returned.
    pub async fn plan_tasks(&self) -> Result<ScanPlan> {
        let started = Instant::now();
        log_info!(
            component = "scan",
            event = "planning_started",
            table = %self.table.id(),
            filters = self.filters.len(),
        );

        let (pushed, bound) = self.bind_filters()?;
        let view = self.table.load_view(&self.options).await?;
        let spec = self.table.metadata().partition_spec();
        let evaluator = match bound.len() {
            0 => None,
            1 => bound
                .into_iter()
                .next()
                .map(|predicate| PartitionEvaluator::new(spec, predicate)),
            _ => Some(PartitionEvaluator::new(spec, BoundPredicate::And(bound))),
        };

        let plan = ScanPlan {
            base_snapshot_id: view.base.snapshot_id(),
            change_snapshot_id: view.change.snapshot_id(),
            pushed_filters: pushed,
            partitions: Arc::new(group_by_partition(&view, evaluator.as_ref())),
            options: self.options.clone(),
        };
        log_info!(
            component = "scan",
            event = "planning_finished",
            table = %self.table.id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            partitions = plan.partitions.len(),
            tasks = plan.tasks().count(),
        );
        Ok(plan)
    }

    fn bind_filters(&self) -> Result<(Vec<Predicate>, Vec<BoundPredicate>)> {
        let schema = self.table.schema();
        let mut pushed = Vec::new();
        let mut bound = Vec::new();
        for term in self.filters.iter().flat_map(conjuncts) {
            match term.bind(schema, self.options.case_sensitive) {
                Ok(predicate) => {
                    pushed.push(term.clone());
                    bound.push(predicate);
                }
                Err(err) if err.is_structural() => return Err(Error::Bind(err)),
                Err(err) => {
                    log_debug!(
                        component = "scan",
                        event = "filter_term_dropped",
                        table = %self.table.id(),
                        term = %term,
                        reason = %err,
                    );
                }
            }
        }
        Ok((pushed, bound))
    }
}

fn conjuncts(predicate: &Predicate) -> Vec<&Predicate> {
    match predicate.kind() {
        PredicateNode::And(children) if !children.is_empty() => {
            children.iter().flat_map(conjuncts).collect()
        }
        _ => vec![predicate],
    }
}

fn group_by_partition(
    view: &TableView,
    evaluator: Option<&PartitionEvaluator>,
) -> Vec<KeyedTableScanTask> {
    let may_match =
        |partition: &PartitionKey| evaluator.map_or(true, |eval| eval.may_match(partition));
    let watermarks = view.base.watermarks();

    let mut partitions: BTreeMap<PartitionKey, KeyedTableScanTask> = BTreeMap::new();
    let base = view.base.files().iter();
    let pending = view
        .change
        .files()
        .iter()
        .filter(|file| !file.is_absorbed_by(watermarks.get(file.partition())));
    for file in base.chain(pending) {
        if !may_match(file.partition()) {
            continue;
        }
        partitions
            .entry(file.partition().clone())
            .or_insert_with(|| KeyedTableScanTask::new(file.partition().clone()))
            .push(file.clone());
    }
    partitions.into_values().collect()
}

/// Outcome of scan planning over one point-in-time view of the table.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    base_snapshot_id: Option<SnapshotId>,
    change_snapshot_id: Option<SnapshotId>,
    pushed_filters: Vec<Predicate>,
    partitions: Arc<Vec<KeyedTableScanTask>>,
    options: ScanOptions,
}

impl ScanPlan {
    /// Filter terms that bound against the schema and were used for pruning.
    pub fn pushed_filters(&self) -> &[Predicate] {
        &self.pushed_filters
    }

    /// BASE snapshot the plan was computed from.
    pub fn base_snapshot_id(&self) -> Option<SnapshotId> {
        self.base_snapshot_id
    }

    /// CHANGE snapshot the plan was computed from.
    pub fn change_snapshot_id(&self) -> Option<SnapshotId> {
        self.change_snapshot_id
    }

    /// Per-partition tasks in partition order.
    pub fn partition_tasks(&self) -> &[KeyedTableScanTask] {
        &self.partitions
    }

    /// Lazily bin-pack the partition tasks into combined tasks.
    ///
    /// Each partition is weighed by `max(cost, open_file_cost)` and lands in
    /// exactly one combined task.
    pub fn tasks(&self) -> impl Iterator<Item = CombinedScanTask> + '_ {
        let open_file_cost = self.options.open_file_cost;
        PackingIter::new(
            self.partitions.iter().cloned(),
            self.options.split_target_size,
            self.options.split_lookback,
            move |task: &KeyedTableScanTask| task.cost().max(open_file_cost),
        )
        .map(CombinedScanTask::new)
    }

    /// Summed cost and record count of every file the plan reads.
    pub fn statistics(&self) -> ScanStatistics {
        self.partitions
            .iter()
            .fold(ScanStatistics::default(), |stats, task| ScanStatistics {
                size_in_bytes: stats.size_in_bytes.saturating_add(task.cost()),
                num_rows: stats.num_rows.saturating_add(task.record_count()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        table::{TableSide, TableStore},
        test_util::{base_file, day, delete_file, insert_file, keyed_table},
    };

    async fn seed(table: &KeyedTable) {
        table
            .new_change_append()
            .add_file(insert_file("ins-4", "2024-01-01", 40, 4))
            .add_file(insert_file("ins-6", "2024-01-01", 60, 6))
            .add_file(delete_file("del-6", "2024-01-01", 10, 6))
            .add_file(insert_file("ins-2", "2024-01-02", 20, 2))
            .commit()
            .await
            .unwrap();
        table
            .new_rewrite_partitions()
            .add_file(base_file("base-1", "2024-01-01", 1000))
            .with_transaction_id(5)
            .commit()
            .await
            .unwrap();
    }

    fn paths(files: &[FileScanTask]) -> Vec<&str> {
        files.iter().map(|f| f.file().path()).collect()
    }

    #[tokio::test]
    async fn change_files_at_or_below_watermark_are_skipped() {
        let (table, _) = keyed_table();
        seed(&table).await;
        let plan = table.new_scan().plan_tasks().await.unwrap();

        let tasks = plan.partition_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].partition(), &day("2024-01-01"));
        assert_eq!(paths(tasks[0].base_files()), vec!["base-1"]);
        assert_eq!(paths(tasks[0].insert_files()), vec!["ins-6"]);
        assert_eq!(paths(tasks[0].delete_files()), vec!["del-6"]);
        assert_eq!(paths(tasks[1].insert_files()), vec!["ins-2"]);
        assert!(tasks[1].base_files().is_empty());
    }

    #[tokio::test]
    async fn filters_prune_partitions_and_unbindable_terms_drop() {
        let (table, _) = keyed_table();
        seed(&table).await;
        let plan = table
            .new_scan()
            .filter(Predicate::eq("dt", "2024-01-02").and(Predicate::eq("nope", 1)))
            .plan_tasks()
            .await
            .unwrap();
        assert_eq!(plan.pushed_filters(), &[Predicate::eq("dt", "2024-01-02")]);
        assert_eq!(plan.partition_tasks().len(), 1);
        assert_eq!(plan.statistics().size_in_bytes, 20);
    }

    #[tokio::test]
    async fn malformed_filter_fails_planning() {
        let (table, _) = keyed_table();
        let err = table
            .new_scan()
            .filter(Predicate::in_list("dt", Vec::<&str>::new()))
            .plan_tasks()
            .await
            .expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn partitions_are_packed_whole() {
        let (table, _) = keyed_table();
        seed(&table).await;
        let plan = table
            .new_scan()
            .options(ScanOptions::default().split_target_size(100).open_file_cost(1))
            .plan_tasks()
            .await
            .unwrap();
        let combined: Vec<_> = plan.tasks().collect();
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0].tasks().len(), 1);
        assert_eq!(combined[0].cost(), 1070);

        let merged: Vec<_> = table
            .new_scan()
            .plan_tasks()
            .await
            .unwrap()
            .tasks()
            .collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].tasks().len(), 2);
    }

    #[tokio::test]
    async fn plan_is_restartable() {
        let (table, _) = keyed_table();
        seed(&table).await;
        let plan = table.new_scan().plan_tasks().await.unwrap();
        let first: Vec<_> = plan.tasks().collect();
        let second: Vec<_> = plan.tasks().collect();
        assert_eq!(first, second);
        assert_eq!(
            plan.statistics(),
            ScanStatistics {
                size_in_bytes: 1090,
                num_rows: 100 + 6 + 1 + 2,
            }
        );
    }

    #[tokio::test]
    async fn unreachable_store_fails_planning() {
        let (table, store) = keyed_table();
        seed(&table).await;
        store.set_unavailable(TableSide::Change, true).await;
        let err = table.new_scan().plan_tasks().await.expect_err("down");
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(store.exists(TableSide::Change).await.unwrap());
    }
}
