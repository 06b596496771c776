//! Error type of the keyed-table core.

use thiserror::Error;

use crate::{id::SnapshotId, predicate::BindError, table::TableSide};

/// Coarse classification of [`Error`] values used by callers to decide on retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller supplied an invalid value (bad transaction id, malformed predicate).
    InvalidArgument,
    /// The requested table, database or table side does not exist.
    NotFound,
    /// The object being created already exists.
    AlreadyExists,
    /// An optimistic commit lost a race and must be retried by the caller.
    CommitConflict,
    /// The table library or catalog could not be reached.
    Unavailable,
}

/// Error type surfaced by the keyed table core.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A predicate could not be bound against the table schema.
    #[error("predicate bind error: {0}")]
    Bind(#[from] BindError),
    /// Requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Object to be created already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The side's current snapshot moved after the transaction was opened.
    #[error("commit conflict on {side} side: expected base snapshot {expected:?}, found {actual:?}")]
    CommitConflict {
        /// Side the transaction was opened against.
        side: TableSide,
        /// Snapshot the transaction was based on.
        expected: Option<SnapshotId>,
        /// Snapshot that is current at commit time.
        actual: Option<SnapshotId>,
    },
    /// I/O failure reaching the table library or catalog.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::Bind(_) => ErrorKind::InvalidArgument,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::CommitConflict { .. } => ErrorKind::CommitConflict,
            Error::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Whether the failed operation may succeed when retried against fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::CommitConflict)
    }
}

/// Convenience result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
