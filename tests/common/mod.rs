#![allow(dead_code)]

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};
use keyed_table::{
    Catalog, DataFile, FileContent, InMemoryCatalog, KeyedTable, PartitionKey, PartitionSpec,
    TableDefinition, TableIdentifier,
};

pub const CATALOG: &str = "local";
pub const DATABASE: &str = "sales";

pub fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Int64, false),
        Field::new("dt", DataType::Utf8, true),
        Field::new("amount", DataType::Float64, true),
    ]))
}

pub fn identifier(table: &str) -> TableIdentifier {
    TableIdentifier::of(CATALOG, DATABASE, table)
}

/// Catalog with one database and a keyed `orders` table partitioned by `dt`.
pub async fn orders_table() -> (InMemoryCatalog, KeyedTable) {
    let catalog = InMemoryCatalog::new(CATALOG);
    catalog.create_database(DATABASE).await.expect("database");
    let table = catalog
        .create_table(
            TableDefinition::new(identifier("orders"), schema())
                .primary_key(["order_id"])
                .partition_spec(PartitionSpec::identity(["dt"])),
        )
        .await
        .expect("table");
    (catalog, table)
}

pub fn day(dt: &str) -> PartitionKey {
    PartitionKey::from_iter([dt])
}

pub fn base(path: &str, dt: &str, size: u64, records: u64) -> DataFile {
    DataFile::base(path, day(dt), size, records)
}

pub fn insert(path: &str, dt: &str, size: u64, txn: i64) -> DataFile {
    DataFile::change(path, FileContent::Insert, day(dt), size, 10, txn).expect("insert file")
}

pub fn delete(path: &str, dt: &str, size: u64, txn: i64) -> DataFile {
    DataFile::change(path, FileContent::EqualityDelete, day(dt), size, 1, txn)
        .expect("delete file")
}

pub fn paths<'a>(files: impl IntoIterator<Item = &'a keyed_table::scan::FileScanTask>) -> Vec<String> {
    let mut out: Vec<_> = files
        .into_iter()
        .map(|task| task.file().path().to_string())
        .collect();
    out.sort();
    out
}
