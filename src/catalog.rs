//! Registration of keyed tables under databases.
//!
//! [`Catalog`] is the management-side seam: it creates the physical sides of
//! a table and hands out [`KeyedTable`] handles. [`InMemoryCatalog`] keeps
//! everything in process, one [`InMemoryTableStore`] per table.

use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use arrow::datatypes::SchemaRef;
use async_lock::RwLock;
use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    id::TableIdentifier,
    observability::log_info,
    partition::PartitionSpec,
    table::{
        memory::InMemoryTableStore, KeyedTable, TableMetadata, TableSide, FORMAT_VERSION,
        TABLE_CREATE_TIME,
    },
};

/// Everything needed to create a table.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    identifier: TableIdentifier,
    schema: SchemaRef,
    primary_key: Vec<String>,
    partition_spec: PartitionSpec,
    properties: BTreeMap<String, String>,
}

impl TableDefinition {
    /// Unkeyed, unpartitioned table definition.
    pub fn new(identifier: TableIdentifier, schema: SchemaRef) -> Self {
        Self {
            identifier,
            schema,
            primary_key: Vec::new(),
            partition_spec: PartitionSpec::unpartitioned(),
            properties: BTreeMap::new(),
        }
    }

    /// Primary key columns. A non-empty key makes the table keyed.
    #[must_use]
    pub fn primary_key<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TableDefinition {
            primary_key: columns.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    /// Partition spec; identity transforms only.
    #[must_use]
    pub fn partition_spec(self, partition_spec: PartitionSpec) -> Self {
        TableDefinition {
            partition_spec,
            ..self
        }
    }

    /// Set a table property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Identifier the table is created under.
    pub fn identifier(&self) -> &TableIdentifier {
        &self.identifier
    }
}

/// Catalog of databases and the keyed tables registered in them.
#[async_trait]
pub trait Catalog: Send + Sync + fmt::Debug {
    /// Name tables of this catalog carry in their identifier.
    fn name(&self) -> &str;

    /// Database names in order.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Create an empty database; fails when it already exists.
    async fn create_database(&self, database: &str) -> Result<()>;

    /// Drop an empty database.
    async fn drop_database(&self, database: &str) -> Result<()>;

    /// Tables registered in `database`.
    async fn list_tables(&self, database: &str) -> Result<Vec<TableIdentifier>>;

    /// Create a table. Keyed tables get both a BASE and a CHANGE side,
    /// unkeyed tables only a BASE side.
    async fn create_table(&self, definition: TableDefinition) -> Result<KeyedTable>;

    /// Handle to a registered table.
    async fn load_table(&self, identifier: &TableIdentifier) -> Result<KeyedTable>;

    /// Unregister a table; `purge` also deletes its physical sides.
    async fn drop_table(&self, identifier: &TableIdentifier, purge: bool) -> Result<()>;

    /// Whether `identifier` is registered.
    async fn table_exists(&self, identifier: &TableIdentifier) -> Result<bool>;
}

#[derive(Debug)]
struct TableEntry {
    table: KeyedTable,
    store: Arc<InMemoryTableStore>,
}

/// In-process [`Catalog`].
#[derive(Debug)]
pub struct InMemoryCatalog {
    name: String,
    databases: RwLock<BTreeMap<String, BTreeMap<String, TableEntry>>>,
}

impl InMemoryCatalog {
    /// Empty catalog named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            databases: RwLock::new(BTreeMap::new()),
        }
    }

    fn check_catalog(&self, identifier: &TableIdentifier) -> Result<()> {
        if identifier.catalog() != self.name {
            return Err(Error::InvalidArgument(format!(
                "table {identifier} does not belong to catalog {}",
                self.name
            )));
        }
        Ok(())
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

fn database_not_found(database: &str) -> Error {
    Error::NotFound(format!("database {database} does not exist"))
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(self.databases.read().await.keys().cloned().collect())
    }

    async fn create_database(&self, database: &str) -> Result<()> {
        let mut databases = self.databases.write().await;
        if databases.contains_key(database) {
            return Err(Error::AlreadyExists(format!(
                "database {database} already exists"
            )));
        }
        databases.insert(database.to_string(), BTreeMap::new());
        log_info!(
            component = "catalog",
            event = "database_created",
            catalog = self.name.as_str(),
            database = database,
        );
        Ok(())
    }

    async fn drop_database(&self, database: &str) -> Result<()> {
        let mut databases = self.databases.write().await;
        let tables = databases
            .get(database)
            .ok_or_else(|| database_not_found(database))?;
        if !tables.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "database {database} still holds {} tables",
                tables.len()
            )));
        }
        databases.remove(database);
        log_info!(
            component = "catalog",
            event = "database_dropped",
            catalog = self.name.as_str(),
            database = database,
        );
        Ok(())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<TableIdentifier>> {
        let databases = self.databases.read().await;
        let tables = databases
            .get(database)
            .ok_or_else(|| database_not_found(database))?;
        Ok(tables.values().map(|entry| entry.table.id().clone()).collect())
    }

    async fn create_table(&self, definition: TableDefinition) -> Result<KeyedTable> {
        let TableDefinition {
            identifier,
            schema,
            primary_key,
            partition_spec,
            mut properties,
        } = definition;
        self.check_catalog(&identifier)?;

        let keyed = !primary_key.is_empty();
        properties.insert(TABLE_CREATE_TIME.to_string(), now_millis().to_string());
        if keyed {
            properties.insert(FORMAT_VERSION.to_string(), "2".to_string());
        }
        let metadata =
            TableMetadata::try_new(identifier.clone(), schema, primary_key, partition_spec, properties)?;

        let mut databases = self.databases.write().await;
        let tables = databases
            .get_mut(identifier.database())
            .ok_or_else(|| database_not_found(identifier.database()))?;
        if tables.contains_key(identifier.table_name()) {
            return Err(Error::AlreadyExists(format!(
                "table {identifier} already exists"
            )));
        }
        let store = Arc::new(if keyed {
            InMemoryTableStore::keyed()
        } else {
            InMemoryTableStore::base_only()
        });
        let table = KeyedTable::new(metadata, store.clone());
        tables.insert(
            identifier.table_name().to_string(),
            TableEntry {
                table: table.clone(),
                store,
            },
        );
        log_info!(
            component = "catalog",
            event = "table_created",
            table = %identifier,
            keyed = keyed,
        );
        Ok(table)
    }

    async fn load_table(&self, identifier: &TableIdentifier) -> Result<KeyedTable> {
        self.check_catalog(identifier)?;
        let databases = self.databases.read().await;
        databases
            .get(identifier.database())
            .and_then(|tables| tables.get(identifier.table_name()))
            .map(|entry| entry.table.clone())
            .ok_or_else(|| Error::NotFound(format!("table {identifier} does not exist")))
    }

    async fn drop_table(&self, identifier: &TableIdentifier, purge: bool) -> Result<()> {
        self.check_catalog(identifier)?;
        let entry = {
            let mut databases = self.databases.write().await;
            databases
                .get_mut(identifier.database())
                .and_then(|tables| tables.remove(identifier.table_name()))
                .ok_or_else(|| Error::NotFound(format!("table {identifier} does not exist")))?
        };
        if purge {
            entry.store.drop_side(TableSide::Base).await;
            entry.store.drop_side(TableSide::Change).await;
        }
        log_info!(
            component = "catalog",
            event = "table_dropped",
            table = %identifier,
            purge = purge,
        );
        Ok(())
    }

    async fn table_exists(&self, identifier: &TableIdentifier) -> Result<bool> {
        match self.load_table(identifier).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::{
        error::ErrorKind,
        partition::{PartitionField, Transform},
        table::TableStore,
    };

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("dt", DataType::Utf8, true),
        ]))
    }

    fn id(table: &str) -> TableIdentifier {
        TableIdentifier::of("local", "db", table)
    }

    async fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new("local");
        catalog.create_database("db").await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn keyed_tables_get_both_sides() {
        let catalog = catalog().await;
        let table = catalog
            .create_table(
                TableDefinition::new(id("orders"), schema())
                    .primary_key(["id"])
                    .partition_spec(PartitionSpec::identity(["dt"])),
            )
            .await
            .unwrap();
        assert!(table.metadata().is_keyed());
        assert!(table.store().exists(TableSide::Change).await.unwrap());
        assert_eq!(table.metadata().properties()[FORMAT_VERSION], "2");
        assert!(table.metadata().properties().contains_key(TABLE_CREATE_TIME));
        assert!(catalog.table_exists(&id("orders")).await.unwrap());
        assert_eq!(catalog.list_tables("db").await.unwrap(), vec![id("orders")]);
    }

    #[tokio::test]
    async fn unkeyed_tables_have_no_change_side() {
        let catalog = catalog().await;
        let table = catalog
            .create_table(TableDefinition::new(id("log"), schema()))
            .await
            .unwrap();
        assert!(!table.store().exists(TableSide::Change).await.unwrap());
        assert!(!table.metadata().properties().contains_key(FORMAT_VERSION));
    }

    #[tokio::test]
    async fn duplicate_and_invalid_definitions_are_rejected() {
        let catalog = catalog().await;
        let definition = TableDefinition::new(id("t"), schema()).primary_key(["id"]);
        catalog.create_table(definition.clone()).await.unwrap();
        let err = catalog.create_table(definition).await.expect_err("dup");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let bucketed = TableDefinition::new(id("b"), schema()).partition_spec(PartitionSpec::new(
            vec![PartitionField {
                source: "id".to_string(),
                transform: Transform::Bucket(16),
            }],
        ));
        let err = catalog.create_table(bucketed).await.expect_err("bucket");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = catalog
            .create_table(TableDefinition::new(
                TableIdentifier::of("local", "missing", "t"),
                schema(),
            ))
            .await
            .expect_err("no db");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn drop_semantics() {
        let catalog = catalog().await;
        let table = catalog
            .create_table(TableDefinition::new(id("t"), schema()).primary_key(["id"]))
            .await
            .unwrap();
        let err = catalog.drop_database("db").await.expect_err("not empty");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        catalog.drop_table(&id("t"), true).await.unwrap();
        assert!(!table.store().exists(TableSide::Base).await.unwrap());
        let err = catalog.drop_table(&id("t"), false).await.expect_err("gone");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        catalog.drop_database("db").await.unwrap();
        assert!(catalog.list_databases().await.unwrap().is_empty());
    }
}
