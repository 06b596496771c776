//! Committed snapshots of one table side and their summary properties.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{file::DataFile, id::SnapshotId};

/// Well-known snapshot summary keys written by the table library.
pub mod summary {
    /// Operation that produced the snapshot.
    pub const OPERATION: &str = "operation";
    /// Number of data files added by the snapshot.
    pub const ADDED_FILES: &str = "added-data-files";
    /// Bytes added by the snapshot.
    pub const ADDED_FILE_SIZE: &str = "added-files-size";
    /// Records added by the snapshot.
    pub const ADDED_RECORDS: &str = "added-records";
    /// Number of data files removed by the snapshot.
    pub const DELETED_FILES: &str = "deleted-data-files";
    /// Bytes removed by the snapshot.
    pub const REMOVED_FILE_SIZE: &str = "removed-files-size";
    /// Records removed by the snapshot.
    pub const DELETED_RECORDS: &str = "deleted-records";
    /// Data files live after the snapshot.
    pub const TOTAL_DATA_FILES: &str = "total-data-files";
    /// Bytes live after the snapshot.
    pub const TOTAL_FILE_SIZE: &str = "total-files-size";
    /// Records live after the snapshot.
    pub const TOTAL_RECORDS: &str = "total-records";
    /// Transaction id recorded by writes that carry one.
    pub const TRANSACTION_ID: &str = "transaction-id";
}

/// Operation recorded on a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Files were only added.
    Append,
    /// Files were replaced (partition rewrite).
    Overwrite,
}

impl Operation {
    /// Name stored under the `operation` summary key.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Append => "append",
            Operation::Overwrite => "overwrite",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a committed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    snapshot_id: SnapshotId,
    parent_id: Option<SnapshotId>,
    timestamp_millis: i64,
    summary: BTreeMap<String, String>,
}

impl Snapshot {
    /// Build a snapshot record.
    pub fn new(
        snapshot_id: SnapshotId,
        parent_id: Option<SnapshotId>,
        timestamp_millis: i64,
        summary: BTreeMap<String, String>,
    ) -> Self {
        Self {
            snapshot_id,
            parent_id,
            timestamp_millis,
            summary,
        }
    }

    /// Snapshot identifier.
    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }

    /// Parent snapshot, `None` for the first snapshot of a side.
    pub fn parent_id(&self) -> Option<SnapshotId> {
        self.parent_id
    }

    /// Commit time in milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    /// Summary key/value pairs.
    pub fn summary(&self) -> &BTreeMap<String, String> {
        &self.summary
    }

    /// Operation name, empty when the summary does not record one.
    pub fn operation(&self) -> &str {
        self.summary
            .get(summary::OPERATION)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Read an integer summary property, falling back to `default` when it is
/// absent or unparseable.
pub fn property_as_i64(props: &BTreeMap<String, String>, key: &str, default: i64) -> i64 {
    props
        .get(key)
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

/// Accumulates the added/removed counters of a commit and renders them,
/// together with the resulting totals, as a summary map.
#[derive(Debug, Default)]
pub(crate) struct SnapshotSummaryBuilder {
    added_files: u64,
    added_size: u64,
    added_records: u64,
    deleted_files: u64,
    removed_size: u64,
    deleted_records: u64,
    extra: BTreeMap<String, String>,
}

impl SnapshotSummaryBuilder {
    pub(crate) fn added(&mut self, file: &DataFile) {
        self.added_files += 1;
        self.added_size += file.file_size_in_bytes();
        self.added_records += file.record_count();
    }

    pub(crate) fn removed(&mut self, file: &DataFile) {
        self.deleted_files += 1;
        self.removed_size += file.file_size_in_bytes();
        self.deleted_records += file.record_count();
    }

    pub(crate) fn set(&mut self, key: &str, value: impl ToString) {
        self.extra.insert(key.to_string(), value.to_string());
    }

    pub(crate) fn build<'a>(
        self,
        operation: Operation,
        live_files: impl Iterator<Item = &'a DataFile>,
    ) -> BTreeMap<String, String> {
        let (total_files, total_size, total_records) =
            live_files.fold((0u64, 0u64, 0u64), |(files, size, records), file| {
                (
                    files + 1,
                    size + file.file_size_in_bytes(),
                    records + file.record_count(),
                )
            });

        let mut props = self.extra;
        props.insert(summary::OPERATION.to_string(), operation.to_string());
        let counters = [
            (summary::ADDED_FILES, self.added_files),
            (summary::ADDED_FILE_SIZE, self.added_size),
            (summary::ADDED_RECORDS, self.added_records),
            (summary::DELETED_FILES, self.deleted_files),
            (summary::REMOVED_FILE_SIZE, self.removed_size),
            (summary::DELETED_RECORDS, self.deleted_records),
            (summary::TOTAL_DATA_FILES, total_files),
            (summary::TOTAL_FILE_SIZE, total_size),
            (summary::TOTAL_RECORDS, total_records),
        ];
        for (key, value) in counters {
            if value > 0 || key.starts_with("total-") {
                props.insert(key.to_string(), value.to_string());
            }
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionKey;

    #[test]
    fn property_falls_back_on_missing_or_garbage() {
        let mut props = BTreeMap::new();
        props.insert(summary::ADDED_RECORDS.to_string(), "42".to_string());
        props.insert(summary::ADDED_FILES.to_string(), "four".to_string());
        assert_eq!(property_as_i64(&props, summary::ADDED_RECORDS, 0), 42);
        assert_eq!(property_as_i64(&props, summary::ADDED_FILES, 0), 0);
        assert_eq!(property_as_i64(&props, summary::TOTAL_RECORDS, -1), -1);
    }

    #[test]
    fn summary_records_counters_and_totals() {
        let kept = DataFile::base("kept", PartitionKey::from_iter(["a"]), 100, 10);
        let added = DataFile::base("added", PartitionKey::from_iter(["b"]), 50, 5);
        let removed = DataFile::base("removed", PartitionKey::from_iter(["b"]), 70, 7);

        let mut builder = SnapshotSummaryBuilder::default();
        builder.added(&added);
        builder.removed(&removed);
        let props = builder.build(Operation::Overwrite, [&kept, &added].into_iter());

        assert_eq!(props[summary::OPERATION], "overwrite");
        assert_eq!(props[summary::ADDED_FILES], "1");
        assert_eq!(props[summary::REMOVED_FILE_SIZE], "70");
        assert_eq!(props[summary::TOTAL_DATA_FILES], "2");
        assert_eq!(props[summary::TOTAL_FILE_SIZE], "150");
        assert_eq!(props[summary::TOTAL_RECORDS], "15");
    }

    #[test]
    fn empty_counters_are_omitted() {
        let props = SnapshotSummaryBuilder::default().build(Operation::Append, std::iter::empty());
        assert!(!props.contains_key(summary::ADDED_FILES));
        assert_eq!(props[summary::TOTAL_DATA_FILES], "0");
    }
}
