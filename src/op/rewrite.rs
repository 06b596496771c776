use crate::{
    error::{Error, Result},
    file::DataFile,
    id::TransactionId,
    observability::log_info,
    snapshot::summary,
    table::{KeyedTable, TableSide, TableTransaction},
    watermark::{PartitionWatermarks, WatermarkBatch},
};

/// Partition-level replace of BASE files that advances the watermark of every
/// touched partition to at least the writer's transaction id.
///
/// The file replacement and the watermark update are staged on the same
/// [`TableTransaction`], so the store publishes both in one commit and no
/// reader sees new files under an old watermark or the reverse.
#[derive(Debug, Clone)]
pub struct RewritePartitions {
    table: KeyedTable,
    files: Vec<DataFile>,
    transaction_id: Option<i64>,
}

impl RewritePartitions {
    pub(crate) fn new(table: KeyedTable) -> Self {
        Self {
            table,
            files: Vec::new(),
            transaction_id: None,
        }
    }

    /// Add a file to write. Every partition it belongs to is replaced.
    #[must_use]
    pub fn add_file(mut self, file: DataFile) -> Self {
        self.files.push(file);
        self
    }

    /// Set the writer's transaction id. Validated on [`Self::apply`].
    #[must_use]
    pub fn with_transaction_id(mut self, transaction_id: i64) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    /// Files added so far.
    pub fn files(&self) -> &[DataFile] {
        &self.files
    }

    /// Stage the rewrite on `txn` and return the watermarks it will publish.
    ///
    /// Fails with [`Error::InvalidArgument`] when the transaction id is unset
    /// or not positive, leaving `txn` untouched. Without files this is a no-op
    /// that returns the transaction's current watermarks.
    pub fn apply(&self, txn: &mut TableTransaction) -> Result<PartitionWatermarks> {
        let transaction_id = match self.transaction_id {
            Some(raw) => TransactionId::new(raw)?,
            None => {
                return Err(Error::InvalidArgument(
                    "transaction-Id must be set".to_string(),
                ))
            }
        };
        if self.files.is_empty() {
            return Ok(txn.watermarks().clone());
        }
        if txn.side() != TableSide::Base {
            return Err(Error::InvalidArgument(format!(
                "partition rewrite needs a base transaction, got {}",
                txn.side()
            )));
        }
        super::check_partitions(self.table.metadata(), &self.files)?;

        let mut batch = WatermarkBatch::new();
        for file in &self.files {
            batch.push(file.partition().clone(), transaction_id);
        }
        txn.replace_partitions(self.files.clone())?;
        let watermarks = txn.watermarks().with_batch(&batch);
        txn.set_watermarks(watermarks.clone());
        txn.set_summary(summary::TRANSACTION_ID, transaction_id.to_string());
        Ok(watermarks)
    }

    /// Open a BASE transaction, apply the rewrite and commit it.
    ///
    /// A lost race surfaces as [`Error::CommitConflict`]; the caller decides
    /// whether to retry.
    pub async fn commit(&self) -> Result<PartitionWatermarks> {
        let store = self.table.store();
        let mut txn = store.open_transaction(TableSide::Base).await?;
        let watermarks = self.apply(&mut txn)?;
        let snapshot = store.commit(txn).await?;
        if let Some(snapshot) = snapshot {
            log_info!(
                component = "rewrite",
                event = "rewrite_committed",
                table = %self.table.id(),
                snapshot_id = %snapshot.snapshot_id(),
                transaction_id = ?self.transaction_id,
                files = self.files.len(),
                partitions = self.partition_count(),
            );
        }
        Ok(watermarks)
    }

    fn partition_count(&self) -> usize {
        let mut partitions: Vec<_> = self.files.iter().map(DataFile::partition).collect();
        partitions.sort_unstable();
        partitions.dedup();
        partitions.len()
    }
}
