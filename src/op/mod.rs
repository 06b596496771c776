//! Write operations on a keyed table.
//!
//! Both operations follow the same shape: collect files on a builder, then
//! `apply` the builder to an explicit [`TableTransaction`] or let `commit`
//! open, apply and publish one in a single call.
//!
//! [`TableTransaction`]: crate::table::TableTransaction

mod append;
mod rewrite;

pub use append::AppendChangeFiles;
pub use rewrite::RewritePartitions;

use crate::{error::Result, file::DataFile, table::TableMetadata};

fn check_partitions(metadata: &TableMetadata, files: &[DataFile]) -> Result<()> {
    for file in files {
        metadata
            .partition_spec()
            .check_key(metadata.schema(), file.partition())?;
    }
    Ok(())
}
