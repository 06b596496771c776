//! Keyed table handle and the seam to the underlying snapshot table library.
//!
//! A keyed table is physically two tables: the BASE side holding compacted
//! files and the per-partition watermarks, and the CHANGE side holding
//! append-only delta files. Both are reached through a [`TableStore`], which
//! models the columnar table library: snapshots, optimistic transactions and
//! atomic commits. [`memory::InMemoryTableStore`] is a complete in-process
//! implementation.

pub mod memory;
mod transaction;

use std::{collections::BTreeMap, fmt, future::Future, sync::Arc, time::Duration};

use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use self::transaction::{StagedOp, TableTransaction};
use crate::{
    error::{Error, Result},
    file::DataFile,
    id::{SnapshotId, TableIdentifier},
    op::{AppendChangeFiles, RewritePartitions},
    option::ScanOptions,
    partition::PartitionSpec,
    scan::KeyedTableScan,
    snapshot::Snapshot,
    watermark::PartitionWatermarks,
};

/// Physical side of a keyed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableSide {
    /// Compacted, query-optimised files.
    Base,
    /// Append-only change records awaiting compaction.
    Change,
}

impl TableSide {
    /// Lower-case side name.
    pub fn as_str(self) -> &'static str {
        match self {
            TableSide::Base => "base",
            TableSide::Change => "change",
        }
    }
}

impl fmt::Display for TableSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files and watermarks of one side as of a single committed snapshot.
#[derive(Debug, Clone, Default)]
pub struct SideView {
    snapshot: Option<Snapshot>,
    files: Arc<Vec<DataFile>>,
    watermarks: Arc<PartitionWatermarks>,
}

impl SideView {
    /// Build a view.
    pub fn new(
        snapshot: Option<Snapshot>,
        files: Arc<Vec<DataFile>>,
        watermarks: Arc<PartitionWatermarks>,
    ) -> Self {
        Self {
            snapshot,
            files,
            watermarks,
        }
    }

    /// Snapshot the view was read from, `None` before the first commit.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Identifier of the snapshot the view was read from.
    pub fn snapshot_id(&self) -> Option<SnapshotId> {
        self.snapshot.as_ref().map(Snapshot::snapshot_id)
    }

    /// Live data files.
    pub fn files(&self) -> &[DataFile] {
        &self.files
    }

    /// Partition watermarks recorded with the snapshot.
    pub fn watermarks(&self) -> &PartitionWatermarks {
        &self.watermarks
    }
}

/// Point-in-time view over both sides of a keyed table.
#[derive(Debug, Clone, Default)]
pub struct TableView {
    /// BASE side view.
    pub base: SideView,
    /// CHANGE side view. Empty when the table has no CHANGE side.
    pub change: SideView,
}

/// Operations the keyed-table core consumes from the columnar table library.
///
/// Implementations must make [`TableStore::commit`] atomic: a reader calling
/// [`TableStore::load_view`] observes either none or all of a transaction's
/// staged file changes and watermark updates.
#[async_trait]
pub trait TableStore: Send + Sync + fmt::Debug {
    /// Whether the physical table for `side` exists.
    async fn exists(&self, side: TableSide) -> Result<bool>;

    /// Current snapshot of `side`, `None` before the first commit.
    async fn current_snapshot(&self, side: TableSide) -> Result<Option<Snapshot>>;

    /// Every snapshot of `side` in history order.
    async fn list_snapshots(&self, side: TableSide) -> Result<Vec<Snapshot>>;

    /// Files and watermarks of the current snapshot of `side`, read atomically.
    async fn load_view(&self, side: TableSide) -> Result<SideView>;

    /// Open a transaction context against the current snapshot of `side`.
    async fn open_transaction(&self, side: TableSide) -> Result<TableTransaction>;

    /// Atomically publish the staged work of `txn`.
    ///
    /// Returns the new snapshot, or `None` when nothing was staged. Fails with
    /// [`Error::CommitConflict`] when the side moved since the transaction was
    /// opened.
    async fn commit(&self, txn: TableTransaction) -> Result<Option<Snapshot>>;
}

/// Table property: bin-packing target size of a combined scan task.
pub const SPLIT_TARGET_SIZE: &str = "read.split.target-size";
/// Table property: minimum weight of a file in bin packing.
pub const SPLIT_OPEN_FILE_COST: &str = "read.split.open-file-cost";
/// Table property: number of open bins kept while packing.
pub const SPLIT_LOOKBACK: &str = "read.split.planning-lookback";
/// Table property: creation time in milliseconds.
pub const TABLE_CREATE_TIME: &str = "table.create-time";
/// Table property: table format version.
pub const FORMAT_VERSION: &str = "format-version";

/// Static metadata of a keyed table.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    identifier: TableIdentifier,
    schema: SchemaRef,
    primary_key: Vec<String>,
    partition_spec: PartitionSpec,
    properties: BTreeMap<String, String>,
}

impl TableMetadata {
    /// Build metadata, validating the primary key and partition spec against
    /// the schema.
    pub fn try_new(
        identifier: TableIdentifier,
        schema: SchemaRef,
        primary_key: Vec<String>,
        partition_spec: PartitionSpec,
        properties: BTreeMap<String, String>,
    ) -> Result<Self> {
        for column in &primary_key {
            if schema.field_with_name(column).is_err() {
                return Err(Error::InvalidArgument(format!(
                    "primary key column '{column}' is not in the schema of {identifier}"
                )));
            }
        }
        partition_spec.validate(&schema)?;
        Ok(Self {
            identifier,
            schema,
            primary_key,
            partition_spec,
            properties,
        })
    }

    /// Table identifier.
    pub fn identifier(&self) -> &TableIdentifier {
        &self.identifier
    }

    /// Table schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Primary key columns, empty for unkeyed tables.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Partition spec.
    pub fn partition_spec(&self) -> &PartitionSpec {
        &self.partition_spec
    }

    /// Table properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Whether the table has a primary key, and therefore a CHANGE side.
    pub fn is_keyed(&self) -> bool {
        !self.primary_key.is_empty()
    }
}

/// Handle to a keyed table: metadata plus the store holding both sides.
#[derive(Debug, Clone)]
pub struct KeyedTable {
    metadata: Arc<TableMetadata>,
    store: Arc<dyn TableStore>,
}

impl KeyedTable {
    /// Bind metadata to its store.
    pub fn new(metadata: TableMetadata, store: Arc<dyn TableStore>) -> Self {
        Self {
            metadata: Arc::new(metadata),
            store,
        }
    }

    /// Table identifier.
    pub fn id(&self) -> &TableIdentifier {
        self.metadata.identifier()
    }

    /// Table metadata.
    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Table schema.
    pub fn schema(&self) -> &SchemaRef {
        self.metadata.schema()
    }

    /// Store holding both sides.
    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    /// Start building a merge-on-read scan.
    pub fn new_scan(&self) -> KeyedTableScan {
        KeyedTableScan::new(self.clone())
    }

    /// Start building a BASE partition rewrite.
    pub fn new_rewrite_partitions(&self) -> RewritePartitions {
        RewritePartitions::new(self.clone())
    }

    /// Start building a CHANGE append.
    pub fn new_change_append(&self) -> AppendChangeFiles {
        AppendChangeFiles::new(self.clone())
    }

    /// Current BASE watermarks.
    pub async fn partition_watermarks(&self) -> Result<PartitionWatermarks> {
        let view = self.store.load_view(TableSide::Base).await?;
        Ok(view.watermarks().clone())
    }

    /// Load a point-in-time view of both sides.
    ///
    /// A missing CHANGE side yields an empty CHANGE view. Every store call is
    /// bounded by the scan I/O timeout when one is set.
    pub async fn load_view(&self, options: &ScanOptions) -> Result<TableView> {
        let timeout = options.io_timeout;
        let base = with_timeout(timeout, self.store.load_view(TableSide::Base));
        let change = async {
            if !with_timeout(timeout, self.store.exists(TableSide::Change)).await? {
                return Ok(SideView::default());
            }
            with_timeout(timeout, self.store.load_view(TableSide::Change)).await
        };
        let (base, change) = futures_util::try_join!(base, change)?;
        Ok(TableView { base, change })
    }
}

/// Await `fut`, failing with [`Error::Unavailable`] once `timeout` elapses.
pub(crate) async fn with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Unavailable(format!(
                "table store call timed out after {limit:?}"
            ))),
        },
    }
}
