//! In-process table library with snapshot history and optimistic commits.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_lock::RwLock;
use async_trait::async_trait;

use super::{SideView, StagedOp, TableSide, TableStore, TableTransaction};
use crate::{
    error::{Error, Result},
    file::DataFile,
    id::SnapshotIdGenerator,
    observability::{log_debug, log_warn},
    partition::PartitionKey,
    snapshot::{Operation, Snapshot, SnapshotSummaryBuilder},
    watermark::PartitionWatermarks,
};

#[derive(Debug)]
struct CommittedSnapshot {
    snapshot: Snapshot,
    files: Arc<Vec<DataFile>>,
    watermarks: Arc<PartitionWatermarks>,
}

#[derive(Debug, Default)]
struct SideState {
    history: Vec<CommittedSnapshot>,
    unavailable: bool,
}

impl SideState {
    fn current(&self) -> Option<&CommittedSnapshot> {
        self.history.last()
    }

    fn view(&self) -> SideView {
        match self.current() {
            Some(committed) => SideView::new(
                Some(committed.snapshot.clone()),
                Arc::clone(&committed.files),
                Arc::clone(&committed.watermarks),
            ),
            None => SideView::default(),
        }
    }
}

/// Table library keeping both sides of one keyed table in memory.
///
/// Every commit appends an immutable snapshot; readers clone `Arc`s of the
/// current snapshot under a read lock, so a view never mixes two commits.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    sides: RwLock<HashMap<TableSide, SideState>>,
    ids: SnapshotIdGenerator,
}

impl InMemoryTableStore {
    /// Store with both BASE and CHANGE sides created.
    pub fn keyed() -> Self {
        Self::with_sides(&[TableSide::Base, TableSide::Change])
    }

    /// Store with only a BASE side.
    pub fn base_only() -> Self {
        Self::with_sides(&[TableSide::Base])
    }

    /// Store with exactly the given sides created.
    pub fn with_sides(sides: &[TableSide]) -> Self {
        let sides = sides
            .iter()
            .map(|side| (*side, SideState::default()))
            .collect();
        Self {
            sides: RwLock::new(sides),
            ids: SnapshotIdGenerator::new(),
        }
    }

    /// Remove a side with its whole history.
    pub async fn drop_side(&self, side: TableSide) {
        self.sides.write().await.remove(&side);
    }

    /// Make every call touching `side` fail with [`Error::Unavailable`].
    pub async fn set_unavailable(&self, side: TableSide, unavailable: bool) {
        if let Some(state) = self.sides.write().await.get_mut(&side) {
            state.unavailable = unavailable;
        }
    }

    fn next_timestamp(state: &SideState) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0);
        match state.current() {
            Some(last) => now.max(last.snapshot.timestamp_millis() + 1),
            None => now,
        }
    }
}

fn side_state(sides: &HashMap<TableSide, SideState>, side: TableSide) -> Result<&SideState> {
    let state = sides
        .get(&side)
        .ok_or_else(|| Error::NotFound(format!("{side} table does not exist")))?;
    if state.unavailable {
        return Err(Error::Unavailable(format!("{side} table is unreachable")));
    }
    Ok(state)
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn exists(&self, side: TableSide) -> Result<bool> {
        Ok(self.sides.read().await.contains_key(&side))
    }

    async fn current_snapshot(&self, side: TableSide) -> Result<Option<Snapshot>> {
        let sides = self.sides.read().await;
        let state = side_state(&sides, side)?;
        Ok(state.current().map(|committed| committed.snapshot.clone()))
    }

    async fn list_snapshots(&self, side: TableSide) -> Result<Vec<Snapshot>> {
        let sides = self.sides.read().await;
        let state = side_state(&sides, side)?;
        Ok(state
            .history
            .iter()
            .map(|committed| committed.snapshot.clone())
            .collect())
    }

    async fn load_view(&self, side: TableSide) -> Result<SideView> {
        let sides = self.sides.read().await;
        Ok(side_state(&sides, side)?.view())
    }

    async fn open_transaction(&self, side: TableSide) -> Result<TableTransaction> {
        let sides = self.sides.read().await;
        let view = side_state(&sides, side)?.view();
        Ok(TableTransaction::new(
            side,
            view.snapshot_id(),
            view.watermarks().clone(),
        ))
    }

    async fn commit(&self, txn: TableTransaction) -> Result<Option<Snapshot>> {
        let side = txn.side();
        let mut sides = self.sides.write().await;
        let current_id = {
            let state = side_state(&sides, side)?;
            state.current().map(|committed| committed.snapshot.snapshot_id())
        };
        if current_id != txn.base_snapshot_id() {
            log_warn!(
                component = "store",
                event = "commit_conflict",
                side = %side,
                expected = ?txn.base_snapshot_id(),
                actual = ?current_id,
            );
            return Err(Error::CommitConflict {
                side,
                expected: txn.base_snapshot_id(),
                actual: current_id,
            });
        }
        if txn.is_empty() {
            return Ok(None);
        }

        let Some(state) = sides.get_mut(&side) else {
            return Err(Error::NotFound(format!("{side} table does not exist")));
        };
        let mut live: Vec<DataFile> = state
            .current()
            .map(|committed| committed.files.as_ref().clone())
            .unwrap_or_default();
        let mut summary = SnapshotSummaryBuilder::default();
        let mut operation = Operation::Append;
        for op in txn.ops() {
            match op {
                StagedOp::ReplacePartitions(files) => {
                    operation = Operation::Overwrite;
                    let replaced: BTreeSet<&PartitionKey> =
                        files.iter().map(DataFile::partition).collect();
                    live.retain(|file| {
                        if replaced.contains(file.partition()) {
                            summary.removed(file);
                            false
                        } else {
                            true
                        }
                    });
                    for file in files {
                        summary.added(file);
                        live.push(file.clone());
                    }
                }
                StagedOp::Append(files) => {
                    for file in files {
                        summary.added(file);
                        live.push(file.clone());
                    }
                }
            }
        }
        for (key, value) in txn.summary() {
            summary.set(key, value);
        }

        let watermarks = txn.watermarks().clone();
        let snapshot = Snapshot::new(
            self.ids.generate(),
            current_id,
            Self::next_timestamp(state),
            summary.build(operation, live.iter()),
        );
        log_debug!(
            component = "store",
            event = "snapshot_committed",
            side = %side,
            snapshot_id = %snapshot.snapshot_id(),
            operation = %operation,
            live_files = live.len(),
        );
        state.history.push(CommittedSnapshot {
            snapshot: snapshot.clone(),
            files: Arc::new(live),
            watermarks: Arc::new(watermarks),
        });
        Ok(Some(snapshot))
    }
}
