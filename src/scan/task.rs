//! Serializable units of scan work handed to the compute engine.

use serde::{Deserialize, Serialize};

use crate::{
    file::{DataFile, FileContent},
    partition::PartitionKey,
};

/// Read of one whole data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileScanTask {
    file: DataFile,
}

impl FileScanTask {
    /// Read `file` in full.
    pub fn new(file: DataFile) -> Self {
        Self { file }
    }

    /// File to read.
    pub fn file(&self) -> &DataFile {
        &self.file
    }

    /// Estimated cost in bytes.
    pub fn cost(&self) -> u64 {
        self.file.file_size_in_bytes()
    }

    /// Records in the file.
    pub fn record_count(&self) -> u64 {
        self.file.record_count()
    }
}

/// Merge-on-read work for one partition: its BASE files plus the CHANGE
/// inserts and deletes not yet folded into them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedTableScanTask {
    partition: PartitionKey,
    base_files: Vec<FileScanTask>,
    insert_files: Vec<FileScanTask>,
    delete_files: Vec<FileScanTask>,
}

impl KeyedTableScanTask {
    pub(crate) fn new(partition: PartitionKey) -> Self {
        Self {
            partition,
            base_files: Vec::new(),
            insert_files: Vec::new(),
            delete_files: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, file: DataFile) {
        let bucket = match file.content() {
            FileContent::Data => &mut self.base_files,
            FileContent::Insert => &mut self.insert_files,
            FileContent::EqualityDelete => &mut self.delete_files,
        };
        bucket.push(FileScanTask::new(file));
    }

    /// Partition every file of the task belongs to.
    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    /// BASE files of the partition.
    pub fn base_files(&self) -> &[FileScanTask] {
        &self.base_files
    }

    /// Pending CHANGE inserts.
    pub fn insert_files(&self) -> &[FileScanTask] {
        &self.insert_files
    }

    /// Pending CHANGE equality deletes.
    pub fn delete_files(&self) -> &[FileScanTask] {
        &self.delete_files
    }

    /// Every file of the task: BASE first, then inserts, then deletes.
    pub fn files(&self) -> impl Iterator<Item = &FileScanTask> {
        self.base_files
            .iter()
            .chain(&self.insert_files)
            .chain(&self.delete_files)
    }

    /// Whether the task reads no file.
    pub fn is_empty(&self) -> bool {
        self.base_files.is_empty() && self.insert_files.is_empty() && self.delete_files.is_empty()
    }

    /// Sum of file costs.
    pub fn cost(&self) -> u64 {
        saturating_sum(self.files().map(FileScanTask::cost))
    }

    /// Sum of file record counts, deletes included.
    pub fn record_count(&self) -> u64 {
        saturating_sum(self.files().map(FileScanTask::record_count))
    }
}

/// Unit of parallel work handed to the compute engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedScanTask {
    tasks: Vec<KeyedTableScanTask>,
}

impl CombinedScanTask {
    pub(crate) fn new(tasks: Vec<KeyedTableScanTask>) -> Self {
        Self { tasks }
    }

    /// Partition tasks in planning order.
    pub fn tasks(&self) -> &[KeyedTableScanTask] {
        &self.tasks
    }

    /// Take the partition tasks.
    pub fn into_tasks(self) -> Vec<KeyedTableScanTask> {
        self.tasks
    }

    /// Sum of the partition task costs.
    pub fn cost(&self) -> u64 {
        saturating_sum(self.tasks.iter().map(KeyedTableScanTask::cost))
    }

    /// Sum of the partition task record counts.
    pub fn record_count(&self) -> u64 {
        saturating_sum(self.tasks.iter().map(KeyedTableScanTask::record_count))
    }
}

fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

/// Size estimate of a whole scan plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    /// Bytes the plan reads.
    pub size_in_bytes: u64,
    /// Rows the plan reads, deletes included.
    pub num_rows: u64,
}
