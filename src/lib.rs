#![deny(missing_docs)]
//! Keyed tables on top of a snapshot-versioned columnar table library.
//!
//! A keyed table is two physical tables. The BASE side holds compacted
//! files; the CHANGE side holds append-only delta files waiting to be folded
//! into BASE. This crate owns the pieces that tie the two together:
//!
//! - per-partition transaction watermarks recording which change data BASE
//!   already contains ([`watermark`]),
//! - partition rewrites that replace BASE files and advance watermarks in one
//!   atomic commit ([`op::RewritePartitions`]),
//! - merge-on-read scan planning that pairs BASE files with the CHANGE files
//!   not yet absorbed ([`scan`]),
//! - file and snapshot statistics of both sides ([`stats`]).
//!
//! The table library itself is reached through [`table::TableStore`];
//! [`table::memory::InMemoryTableStore`] implements it in process.

mod observability;

pub mod catalog;
pub mod error;
pub mod file;
pub mod id;
pub mod op;
pub mod option;
pub mod partition;
pub mod predicate;
pub mod scan;
pub mod snapshot;
pub mod stats;
pub mod table;
pub mod watermark;

#[cfg(test)]
mod test_util;

pub use crate::{
    catalog::{Catalog, InMemoryCatalog, TableDefinition},
    error::{Error, ErrorKind, Result},
    file::{DataFile, FileContent},
    id::{SnapshotId, TableIdentifier, TransactionId},
    op::{AppendChangeFiles, RewritePartitions},
    option::ScanOptions,
    partition::{PartitionKey, PartitionSpec, PartitionValue},
    predicate::Predicate,
    scan::{CombinedScanTask, KeyedTableScan, ScanPlan},
    stats::{FilesStatistics, TableStatistics},
    table::{KeyedTable, TableMetadata, TableSide, TableStore, TableTransaction},
    watermark::PartitionWatermarks,
};
