use std::collections::BTreeMap;

use super::TableSide;
use crate::{
    error::{Error, Result},
    file::DataFile,
    id::SnapshotId,
    watermark::PartitionWatermarks,
};

/// File change staged inside a [`TableTransaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedOp {
    /// Replace every live file of the partitions touched by these files with
    /// these files.
    ReplacePartitions(Vec<DataFile>),
    /// Add these files next to the live ones.
    Append(Vec<DataFile>),
}

/// Explicit transaction context threaded through write operations.
///
/// The context records the snapshot it was opened against and the watermarks
/// as of that snapshot. Operations stage file changes and a replacement
/// watermark mapping on it; nothing is visible until the store commits the
/// whole context at once.
#[derive(Debug, Clone)]
pub struct TableTransaction {
    side: TableSide,
    base_snapshot_id: Option<SnapshotId>,
    base_watermarks: PartitionWatermarks,
    staged_watermarks: Option<PartitionWatermarks>,
    ops: Vec<StagedOp>,
    summary: BTreeMap<String, String>,
}

impl TableTransaction {
    /// Open a context on `side` based on the given snapshot and watermarks.
    pub fn new(
        side: TableSide,
        base_snapshot_id: Option<SnapshotId>,
        base_watermarks: PartitionWatermarks,
    ) -> Self {
        Self {
            side,
            base_snapshot_id,
            base_watermarks,
            staged_watermarks: None,
            ops: Vec::new(),
            summary: BTreeMap::new(),
        }
    }

    /// Side the transaction writes to.
    pub fn side(&self) -> TableSide {
        self.side
    }

    /// Snapshot the transaction was opened against.
    pub fn base_snapshot_id(&self) -> Option<SnapshotId> {
        self.base_snapshot_id
    }

    /// Watermarks as of the base snapshot.
    pub fn base_watermarks(&self) -> &PartitionWatermarks {
        &self.base_watermarks
    }

    /// Watermarks the transaction will publish: the staged mapping if one was
    /// set, the base mapping otherwise.
    pub fn watermarks(&self) -> &PartitionWatermarks {
        self.staged_watermarks
            .as_ref()
            .unwrap_or(&self.base_watermarks)
    }

    /// Staged replacement watermark mapping, if any.
    pub fn staged_watermarks(&self) -> Option<&PartitionWatermarks> {
        self.staged_watermarks.as_ref()
    }

    /// Staged file changes in application order.
    pub fn ops(&self) -> &[StagedOp] {
        &self.ops
    }

    /// Extra summary properties recorded on the resulting snapshot.
    pub fn summary(&self) -> &BTreeMap<String, String> {
        &self.summary
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.staged_watermarks.is_none()
    }

    /// Stage a partition-level replace.
    pub fn replace_partitions(&mut self, files: Vec<DataFile>) -> Result<()> {
        self.check_side(&files)?;
        self.ops.push(StagedOp::ReplacePartitions(files));
        Ok(())
    }

    /// Stage an append.
    pub fn append(&mut self, files: Vec<DataFile>) -> Result<()> {
        self.check_side(&files)?;
        self.ops.push(StagedOp::Append(files));
        Ok(())
    }

    /// Stage the watermark mapping to publish with the commit.
    pub fn set_watermarks(&mut self, watermarks: PartitionWatermarks) {
        self.staged_watermarks = Some(watermarks);
    }

    /// Record an extra summary property on the resulting snapshot.
    pub fn set_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.insert(key.into(), value.into());
    }

    fn check_side(&self, files: &[DataFile]) -> Result<()> {
        match files
            .iter()
            .find(|file| file.content().side() != self.side)
        {
            Some(file) => Err(Error::InvalidArgument(format!(
                "{:?} file {} cannot be written to the {} side",
                file.content(),
                file.path(),
                self.side
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::FileContent, partition::PartitionKey};

    #[test]
    fn rejects_files_of_the_other_side() {
        let mut txn = TableTransaction::new(TableSide::Base, None, PartitionWatermarks::new());
        let change = DataFile::change(
            "c1",
            FileContent::Insert,
            PartitionKey::unpartitioned(),
            10,
            1,
            1,
        )
        .expect("change file");
        assert!(txn.replace_partitions(vec![change]).is_err());
        assert!(txn.is_empty());

        let base = DataFile::base("b1", PartitionKey::unpartitioned(), 10, 1);
        txn.replace_partitions(vec![base]).expect("stage");
        assert_eq!(txn.ops().len(), 1);
    }

    #[test]
    fn staged_watermarks_shadow_base() {
        let mut txn = TableTransaction::new(TableSide::Base, None, PartitionWatermarks::new());
        assert!(txn.watermarks().is_empty());
        let mut marks = PartitionWatermarks::new();
        marks.upsert(
            PartitionKey::unpartitioned(),
            crate::id::TransactionId::new(3).expect("txn"),
        );
        txn.set_watermarks(marks.clone());
        assert_eq!(txn.watermarks(), &marks);
        assert!(txn.base_watermarks().is_empty());
        assert!(!txn.is_empty());
    }
}
