use crate::{
    error::{Error, Result},
    file::DataFile,
    observability::log_info,
    snapshot::{summary, Snapshot},
    table::{KeyedTable, TableSide, TableTransaction},
};

/// Append of CHANGE files produced by a writer.
///
/// Every file must carry its writer's transaction id; the scan planner uses
/// it to tell pending change data from data already folded into BASE.
#[derive(Debug, Clone)]
pub struct AppendChangeFiles {
    table: KeyedTable,
    files: Vec<DataFile>,
}

impl AppendChangeFiles {
    pub(crate) fn new(table: KeyedTable) -> Self {
        Self {
            table,
            files: Vec::new(),
        }
    }

    /// Add a CHANGE file to append.
    #[must_use]
    pub fn add_file(mut self, file: DataFile) -> Self {
        self.files.push(file);
        self
    }

    /// Files added so far.
    pub fn files(&self) -> &[DataFile] {
        &self.files
    }

    /// Stage the append on a CHANGE transaction. Empty appends stage nothing.
    pub fn apply(&self, txn: &mut TableTransaction) -> Result<()> {
        if self.files.is_empty() {
            return Ok(());
        }
        if txn.side() != TableSide::Change {
            return Err(Error::InvalidArgument(format!(
                "change append needs a change transaction, got {}",
                txn.side()
            )));
        }
        super::check_partitions(self.table.metadata(), &self.files)?;
        let max_txn = self.files.iter().filter_map(DataFile::transaction_id).max();
        txn.append(self.files.clone())?;
        if let Some(max_txn) = max_txn {
            txn.set_summary(summary::TRANSACTION_ID, max_txn.to_string());
        }
        Ok(())
    }

    /// Open a CHANGE transaction, apply and commit it.
    ///
    /// Returns the new snapshot, `None` for an empty append.
    pub async fn commit(&self) -> Result<Option<Snapshot>> {
        let store = self.table.store();
        let mut txn = store.open_transaction(TableSide::Change).await?;
        self.apply(&mut txn)?;
        let snapshot = store.commit(txn).await?;
        if let Some(snapshot) = &snapshot {
            log_info!(
                component = "rewrite",
                event = "change_appended",
                table = %self.table.id(),
                snapshot_id = %snapshot.snapshot_id(),
                files = self.files.len(),
            );
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        table::TableStore,
        test_util::{base_file, delete_file, insert_file, keyed_table},
    };

    #[tokio::test]
    async fn appends_change_files() {
        let (table, store) = keyed_table();
        let snapshot = table
            .new_change_append()
            .add_file(insert_file("i-1", "2024-01-01", 100, 3))
            .add_file(delete_file("d-1", "2024-01-01", 10, 4))
            .commit()
            .await
            .unwrap()
            .expect("snapshot");
        assert_eq!(snapshot.summary()[summary::TRANSACTION_ID], "4");
        assert_eq!(snapshot.summary()[summary::ADDED_FILES], "2");
        let view = store.load_view(TableSide::Change).await.unwrap();
        assert_eq!(view.files().len(), 2);
    }

    #[tokio::test]
    async fn base_files_are_rejected() {
        let (table, _) = keyed_table();
        let err = table
            .new_change_append()
            .add_file(base_file("b", "2024-01-01", 1))
            .commit()
            .await
            .expect_err("base file");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn empty_append_commits_nothing() {
        let (table, store) = keyed_table();
        assert!(table.new_change_append().commit().await.unwrap().is_none());
        assert!(store
            .list_snapshots(TableSide::Change)
            .await
            .unwrap()
            .is_empty());
    }
}
