//! File and snapshot statistics of the two sides of a keyed table.
//!
//! Collection never fails: a missing side, or any error reaching it, degrades
//! to empty statistics for that side so that monitoring stays available while
//! one side is broken.

use std::{
    collections::BTreeMap,
    iter::Sum,
    ops::{Add, AddAssign},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorKind, Result},
    id::{SnapshotId, TableIdentifier},
    observability::{log_error, log_info, log_warn},
    snapshot::{property_as_i64, summary, Snapshot},
    table::{KeyedTable, TableSide},
};

/// Summary keys of [`TableStatistics`]. Management tooling depends on these
/// exact names.
pub mod keys {
    /// Number of snapshots in the side's history.
    pub const SNAPSHOT_CNT: &str = "snapshotCnt";
    /// Commit time of the current snapshot.
    pub const VISIBLE_TIME: &str = "visibleTime";
    /// Commit time of the oldest snapshot.
    pub const FIRST_SNAPSHOT_COMMIT_TIME: &str = "firstSnapshotCommitTime";
    /// Current total size divided by the snapshot count, rounded down.
    pub const AVERAGE_SNAPSHOT_SIZE: &str = "averageSnapshotSize";
    /// Operation of the current snapshot.
    pub const OPERATION: &str = "operation";
    /// Files added by the current snapshot.
    pub const ADDED_FILES: &str = "addedFiles";
    /// Bytes added by the current snapshot.
    pub const ADDED_FILES_SIZE: &str = "addedFilesSize";
    /// Records added by the current snapshot.
    pub const ADDED_RECORDS: &str = "addedRecords";
    /// Bytes removed by the current snapshot.
    pub const REMOVED_FILES_SIZE: &str = "removedFilesSize";
    /// Files removed by the current snapshot.
    pub const REMOVED_FILES: &str = "removedFiles";
    /// Records removed by the current snapshot.
    pub const REMOVED_RECORDS: &str = "removedRecords";
    /// Live bytes after the current snapshot.
    pub const TOTAL_SIZE: &str = "totalSize";
    /// Identifier of the current snapshot.
    pub const SNAPSHOT_ID: &str = "snapshotId";
    /// Live files after the current snapshot.
    pub const TOTAL_FILES: &str = "totalFiles";
    /// Live records after the current snapshot.
    pub const TOTAL_RECORDS: &str = "totalRecords";
}

/// File count and byte total. Adding two instances sums both fields,
/// saturating at `u64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilesStatistics {
    /// Number of live files.
    pub file_cnt: u64,
    /// Bytes of live files.
    pub total_size: u64,
}

impl FilesStatistics {
    /// Statistics of `file_cnt` files totalling `total_size` bytes.
    pub fn new(file_cnt: u64, total_size: u64) -> Self {
        Self {
            file_cnt,
            total_size,
        }
    }
}

impl Add for FilesStatistics {
    type Output = FilesStatistics;

    fn add(self, rhs: Self) -> Self::Output {
        FilesStatistics {
            file_cnt: self.file_cnt.saturating_add(rhs.file_cnt),
            total_size: self.total_size.saturating_add(rhs.total_size),
        }
    }
}

impl AddAssign for FilesStatistics {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for FilesStatistics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(FilesStatistics::default(), Add::add)
    }
}

/// Statistics of one table side, or of both sides after [`union`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatistics {
    /// Table the statistics describe.
    pub table_identifier: TableIdentifier,
    /// Summary properties keyed by the names in [`keys`].
    pub summary: BTreeMap<String, String>,
    /// Live files of the current snapshot.
    pub total_files_stat: FilesStatistics,
}

impl TableStatistics {
    /// Statistics with an empty summary and zero totals.
    pub fn empty(table_identifier: TableIdentifier) -> Self {
        Self {
            table_identifier,
            summary: BTreeMap::new(),
            total_files_stat: FilesStatistics::default(),
        }
    }
}

/// Statistics of the BASE side.
pub async fn collect_base_table_info(table: &KeyedTable) -> TableStatistics {
    collect(TableSide::Base, table).await
}

/// Statistics of the CHANGE side.
pub async fn collect_change_table_info(table: &KeyedTable) -> TableStatistics {
    collect(TableSide::Change, table).await
}

/// Collect statistics of one side by walking its snapshot history once.
///
/// Never fails; see the module documentation.
pub async fn collect(side: TableSide, table: &KeyedTable) -> TableStatistics {
    log_info!(
        component = "stats",
        event = "collect_started",
        table = %table.id(),
        side = %side,
    );
    match try_collect(side, table).await {
        Ok(Some(stats)) => stats,
        Ok(None) => {
            log_warn!(
                component = "stats",
                event = "table_side_missing",
                table = %table.id(),
                side = %side,
            );
            TableStatistics::empty(table.id().clone())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log_warn!(
                component = "stats",
                event = "table_side_missing",
                table = %table.id(),
                side = %side,
                error = %err,
            );
            TableStatistics::empty(table.id().clone())
        }
        Err(err) => {
            log_error!(
                component = "stats",
                event = "collect_failed",
                table = %table.id(),
                side = %side,
                error = %err,
            );
            TableStatistics::empty(table.id().clone())
        }
    }
}

async fn try_collect(side: TableSide, table: &KeyedTable) -> Result<Option<TableStatistics>> {
    let store = table.store();
    if !store.exists(side).await? {
        return Ok(None);
    }
    // One listing only: every figure below describes the same history.
    let snapshots = store.list_snapshots(side).await?;

    let mut stats = TableStatistics::empty(table.id().clone());
    let (Some(first), Some(current)) = (snapshots.first(), snapshots.last()) else {
        return Ok(Some(stats));
    };
    stats.total_files_stat = FilesStatistics::new(
        summary_u64(current, summary::TOTAL_DATA_FILES),
        summary_u64(current, summary::TOTAL_FILE_SIZE),
    );

    let count = snapshots.len() as u64;
    let mut summary = BTreeMap::new();
    summary.insert(keys::SNAPSHOT_CNT.to_string(), count.to_string());
    summary.insert(
        keys::VISIBLE_TIME.to_string(),
        current.timestamp_millis().to_string(),
    );
    summary.insert(
        keys::FIRST_SNAPSHOT_COMMIT_TIME.to_string(),
        first.timestamp_millis().to_string(),
    );
    summary.insert(
        keys::AVERAGE_SNAPSHOT_SIZE.to_string(),
        (stats.total_files_stat.total_size / count).to_string(),
    );
    summary.extend(
        SnapshotInfo::from_snapshot(current)
            .summary_entries()
            .map(|(key, value)| (key.to_string(), value)),
    );
    stats.summary = summary;
    Ok(Some(stats))
}

fn summary_u64(snapshot: &Snapshot, key: &str) -> u64 {
    u64::try_from(property_as_i64(snapshot.summary(), key, 0)).unwrap_or(0)
}

/// Merge CHANGE and BASE statistics into one view of the keyed table.
///
/// A missing operand yields a copy of the other. With both present the merged
/// summary keeps only `visibleTime` from CHANGE plus `snapshotCnt` and
/// `firstSnapshotCommitTime` from BASE; the identifier is BASE's and the file
/// totals are summed.
pub fn union(
    change: Option<&TableStatistics>,
    base: Option<&TableStatistics>,
) -> Option<TableStatistics> {
    let (change, base) = match (change, base) {
        (None, None) => return None,
        (Some(only), None) | (None, Some(only)) => return Some(only.clone()),
        (Some(change), Some(base)) => (change, base),
    };
    let mut summary = BTreeMap::new();
    let picks = [
        (keys::VISIBLE_TIME, change),
        (keys::SNAPSHOT_CNT, base),
        (keys::FIRST_SNAPSHOT_COMMIT_TIME, base),
    ];
    for (key, source) in picks {
        if let Some(value) = source.summary.get(key) {
            summary.insert(key.to_string(), value.clone());
        }
    }
    Some(TableStatistics {
        table_identifier: base.table_identifier.clone(),
        summary,
        total_files_stat: change.total_files_stat + base.total_files_stat,
    })
}

/// Detail of one snapshot as reported to management tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Snapshot described, `None` before the first commit.
    pub snapshot_id: Option<SnapshotId>,
    /// Operation that produced the snapshot.
    pub operation: String,
    /// Files added.
    pub added_files: i64,
    /// Bytes added.
    pub added_files_size: i64,
    /// Records added.
    pub added_records: i64,
    /// Files removed.
    pub removed_files: i64,
    /// Bytes removed.
    pub removed_files_size: i64,
    /// Records removed.
    pub removed_records: i64,
    /// Live bytes after the snapshot.
    pub total_size: i64,
    /// Live files after the snapshot.
    pub total_files: i64,
    /// Live records after the snapshot.
    pub total_records: i64,
}

impl SnapshotInfo {
    /// Read the detail recorded in `snapshot`'s summary.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let props = snapshot.summary();
        Self {
            snapshot_id: Some(snapshot.snapshot_id()),
            operation: snapshot.operation().to_string(),
            added_files: property_as_i64(props, summary::ADDED_FILES, 0),
            added_files_size: property_as_i64(props, summary::ADDED_FILE_SIZE, 0),
            added_records: property_as_i64(props, summary::ADDED_RECORDS, 0),
            removed_files: property_as_i64(props, summary::DELETED_FILES, 0),
            removed_files_size: property_as_i64(props, summary::REMOVED_FILE_SIZE, 0),
            removed_records: property_as_i64(props, summary::DELETED_RECORDS, 0),
            total_size: property_as_i64(props, summary::TOTAL_FILE_SIZE, 0),
            total_files: property_as_i64(props, summary::TOTAL_DATA_FILES, 0),
            total_records: property_as_i64(props, summary::TOTAL_RECORDS, 0),
        }
    }

    fn summary_entries(&self) -> impl Iterator<Item = (&'static str, String)> {
        let snapshot_id = self
            .snapshot_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        [
            (keys::OPERATION, self.operation.clone()),
            (keys::ADDED_FILES, self.added_files.to_string()),
            (keys::ADDED_FILES_SIZE, self.added_files_size.to_string()),
            (keys::ADDED_RECORDS, self.added_records.to_string()),
            (keys::REMOVED_FILES_SIZE, self.removed_files_size.to_string()),
            (keys::REMOVED_FILES, self.removed_files.to_string()),
            (keys::REMOVED_RECORDS, self.removed_records.to_string()),
            (keys::TOTAL_SIZE, self.total_size.to_string()),
            (keys::SNAPSHOT_ID, snapshot_id),
            (keys::TOTAL_FILES, self.total_files.to_string()),
            (keys::TOTAL_RECORDS, self.total_records.to_string()),
        ]
        .into_iter()
    }
}

/// Detail of the current BASE snapshot; all zero before the first commit.
pub async fn build_base_table_snapshot_info(table: &KeyedTable) -> Result<SnapshotInfo> {
    let current = table.store().current_snapshot(TableSide::Base).await?;
    Ok(current
        .as_ref()
        .map(SnapshotInfo::from_snapshot)
        .unwrap_or_default())
}
