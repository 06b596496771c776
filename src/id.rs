//! Identifiers of tables, transactions and snapshots.

use std::{
    fmt,
    sync::atomic::{AtomicI64, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fully qualified name of a keyed table inside a catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableIdentifier {
    catalog: String,
    database: String,
    table: String,
}

impl TableIdentifier {
    /// Build an identifier from its three parts.
    pub fn of(
        catalog: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            database: database.into(),
            table: table.into(),
        }
    }

    /// Catalog part.
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// Database (namespace) part.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Table name part.
    pub fn table_name(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.database, self.table)
    }
}

/// Writer-supplied identifier of a logical write intent.
///
/// Always strictly positive. The raw value `-1` is reserved for "no watermark"
/// and never constructs a `TransactionId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TransactionId(i64);

impl TransactionId {
    /// Validate and wrap a raw transaction id.
    pub fn new(raw: i64) -> Result<Self> {
        if raw <= 0 {
            return Err(Error::InvalidArgument(format!(
                "transaction-Id must be positive, got {raw}"
            )));
        }
        Ok(Self(raw))
    }

    /// Raw value.
    #[inline]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TransactionId {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TransactionId> for i64 {
    fn from(value: TransactionId) -> Self {
        value.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a committed snapshot of one table side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(i64);

impl SnapshotId {
    /// Wrap a raw snapshot id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Thread-safe allocator handing out increasing snapshot ids.
#[derive(Debug)]
pub struct SnapshotIdGenerator {
    next: AtomicI64,
}

impl SnapshotIdGenerator {
    /// Create a generator whose first id is `1`.
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    /// Produce the next [`SnapshotId`].
    pub fn generate(&self) -> SnapshotId {
        SnapshotId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SnapshotIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
