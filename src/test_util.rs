//! Test-only fixtures for keyed tables backed by the in-memory store.

use std::{collections::BTreeMap, sync::Arc};

use arrow::datatypes::{DataType, Field, Schema};

use crate::{
    file::{DataFile, FileContent},
    id::TableIdentifier,
    partition::{PartitionKey, PartitionSpec},
    table::{memory::InMemoryTableStore, KeyedTable, TableMetadata},
};

pub(crate) fn day(value: &str) -> PartitionKey {
    PartitionKey::from_iter([value])
}

/// Keyed table `(id, dt, payload)` partitioned by identity on `dt`.
pub(crate) fn keyed_table() -> (KeyedTable, Arc<InMemoryTableStore>) {
    keyed_table_with(BTreeMap::new())
}

pub(crate) fn keyed_table_with(
    properties: BTreeMap<String, String>,
) -> (KeyedTable, Arc<InMemoryTableStore>) {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("dt", DataType::Utf8, true),
        Field::new("payload", DataType::Utf8, true),
    ]));
    let metadata = TableMetadata::try_new(
        TableIdentifier::of("test", "db", "events"),
        schema,
        vec!["id".to_string()],
        PartitionSpec::identity(["dt"]),
        properties,
    )
    .expect("metadata");
    let store = Arc::new(InMemoryTableStore::keyed());
    (KeyedTable::new(metadata, store.clone()), store)
}

pub(crate) fn base_file(path: &str, dt: &str, size: u64) -> DataFile {
    DataFile::base(path, day(dt), size, size / 10)
}

pub(crate) fn insert_file(path: &str, dt: &str, size: u64, txn: i64) -> DataFile {
    DataFile::change(path, FileContent::Insert, day(dt), size, size / 10, txn).expect("change")
}

pub(crate) fn delete_file(path: &str, dt: &str, size: u64, txn: i64) -> DataFile {
    DataFile::change(path, FileContent::EqualityDelete, day(dt), size, 1, txn).expect("change")
}
