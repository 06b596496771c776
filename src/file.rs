//! Descriptors of physical data files.
//!
//! The core never opens a data file. A [`DataFile`] carries only what the
//! table library records about it: location, partition, size and row count,
//! plus the transaction id for CHANGE files.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    id::TransactionId,
    partition::PartitionKey,
    table::TableSide,
};

/// Kind of records a data file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileContent {
    /// Compacted rows of the BASE store.
    Data,
    /// Inserted/upserted rows of the CHANGE store.
    Insert,
    /// Primary-key deletes of the CHANGE store.
    EqualityDelete,
}

impl FileContent {
    /// Side of the table this content belongs to.
    pub fn side(self) -> TableSide {
        match self {
            FileContent::Data => TableSide::Base,
            FileContent::Insert | FileContent::EqualityDelete => TableSide::Change,
        }
    }
}

/// Handle to a physical data file plus the metadata the planner needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDataFile")]
pub struct DataFile {
    path: String,
    content: FileContent,
    partition: PartitionKey,
    file_size_in_bytes: u64,
    record_count: u64,
    transaction_id: Option<TransactionId>,
}

#[derive(Deserialize)]
struct RawDataFile {
    path: String,
    content: FileContent,
    partition: PartitionKey,
    file_size_in_bytes: u64,
    record_count: u64,
    transaction_id: Option<TransactionId>,
}

impl TryFrom<RawDataFile> for DataFile {
    type Error = Error;

    fn try_from(raw: RawDataFile) -> Result<Self> {
        match (raw.content.side(), raw.transaction_id) {
            (TableSide::Base, None) => Ok(DataFile::base(
                raw.path,
                raw.partition,
                raw.file_size_in_bytes,
                raw.record_count,
            )),
            (TableSide::Change, Some(txn)) => DataFile::change(
                raw.path,
                raw.content,
                raw.partition,
                raw.file_size_in_bytes,
                raw.record_count,
                txn.get(),
            ),
            (side, txn) => Err(Error::InvalidArgument(format!(
                "{:?} file {} on the {side} side cannot carry transaction id {txn:?}",
                raw.content, raw.path
            ))),
        }
    }
}

impl DataFile {
    /// Describe a BASE data file.
    pub fn base(
        path: impl Into<String>,
        partition: PartitionKey,
        file_size_in_bytes: u64,
        record_count: u64,
    ) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Data,
            partition,
            file_size_in_bytes,
            record_count,
            transaction_id: None,
        }
    }

    /// Describe a CHANGE file written by `transaction_id`.
    ///
    /// Fails when `content` is [`FileContent::Data`] or the id is not positive.
    pub fn change(
        path: impl Into<String>,
        content: FileContent,
        partition: PartitionKey,
        file_size_in_bytes: u64,
        record_count: u64,
        transaction_id: i64,
    ) -> Result<Self> {
        if content.side() != TableSide::Change {
            return Err(Error::InvalidArgument(format!(
                "{content:?} is not a change file content"
            )));
        }
        Ok(Self {
            path: path.into(),
            content,
            partition,
            file_size_in_bytes,
            record_count,
            transaction_id: Some(TransactionId::new(transaction_id)?),
        })
    }

    /// Location of the file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Kind of records held.
    pub fn content(&self) -> FileContent {
        self.content
    }

    /// Partition the file belongs to.
    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    /// Size of the file in bytes.
    pub fn file_size_in_bytes(&self) -> u64 {
        self.file_size_in_bytes
    }

    /// Number of records in the file.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Transaction that wrote this CHANGE file. `None` for BASE files.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    /// Whether this file is already folded into BASE under `watermark`.
    ///
    /// BASE files are never considered absorbed; CHANGE files are absorbed when
    /// their transaction id is at or below the partition watermark.
    pub fn is_absorbed_by(&self, watermark: Option<TransactionId>) -> bool {
        match (self.transaction_id, watermark) {
            (Some(txn), Some(mark)) => txn <= mark,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition() -> PartitionKey {
        PartitionKey::from_iter(["2024-01-01"])
    }

    #[test]
    fn change_file_requires_change_content_and_positive_id() {
        assert!(DataFile::change("c.parquet", FileContent::Data, partition(), 1, 1, 3).is_err());
        assert!(DataFile::change("c.parquet", FileContent::Insert, partition(), 1, 1, 0).is_err());
        let file = DataFile::change("c.parquet", FileContent::EqualityDelete, partition(), 1, 1, 3)
            .expect("change file");
        assert_eq!(file.content().side(), TableSide::Change);
        assert_eq!(file.transaction_id().map(TransactionId::get), Some(3));
    }

    #[test]
    fn absorbed_only_at_or_below_watermark() {
        let mark = TransactionId::new(5).ok();
        let older = DataFile::change("a", FileContent::Insert, partition(), 1, 1, 4).unwrap();
        let same = DataFile::change("b", FileContent::Insert, partition(), 1, 1, 5).unwrap();
        let newer = DataFile::change("c", FileContent::Insert, partition(), 1, 1, 6).unwrap();
        assert!(older.is_absorbed_by(mark));
        assert!(same.is_absorbed_by(mark));
        assert!(!newer.is_absorbed_by(mark));
        assert!(!newer.is_absorbed_by(None));
        assert!(!DataFile::base("d", partition(), 1, 1).is_absorbed_by(mark));
    }

    #[derive(Serialize)]
    struct Encoded {
        path: String,
        content: FileContent,
        partition: PartitionKey,
        file_size_in_bytes: u64,
        record_count: u64,
        transaction_id: Option<i64>,
    }

    fn decode(content: FileContent, transaction_id: Option<i64>) -> bincode::Result<DataFile> {
        let bytes = bincode::serialize(&Encoded {
            path: "f".to_string(),
            content,
            partition: partition(),
            file_size_in_bytes: 8,
            record_count: 2,
            transaction_id,
        })
        .expect("encode");
        bincode::deserialize(&bytes)
    }

    #[test]
    fn decoding_enforces_constructor_rules() {
        assert!(decode(FileContent::Data, Some(3)).is_err());
        assert!(decode(FileContent::Insert, None).is_err());
        assert!(decode(FileContent::Insert, Some(0)).is_err());
        assert!(decode(FileContent::EqualityDelete, Some(-1)).is_err());

        let file = decode(FileContent::Insert, Some(3)).expect("valid change file");
        assert_eq!(file.transaction_id().map(TransactionId::get), Some(3));
        let file = decode(FileContent::Data, None).expect("valid base file");
        assert_eq!(file, DataFile::base("f", partition(), 8, 2));
    }
}
