use std::sync::Arc;

use crate::error::CatalogResult;
use crate::ident::TableIdent;
use crate::types::{FieldType, PartitionSpec, PrimitiveType, TableSchema};

/// A trait that defines the interface for a table catalog.
///
/// A catalog maps a [`TableIdent`] to its storage location and current
/// schema. Implementations are expected to observe the latest committed
/// state on every call; callers must not cache schemas across calls.
#[async_trait::async_trait]
pub trait TableCatalog: Send + Sync {
    /// Whether a table with the given identity exists.
    async fn table_exists(&self, table: &TableIdent) -> CatalogResult<bool>;

    /// Loads a table, capturing a snapshot of its current schema.
    async fn load_table(&self, table: &TableIdent) -> CatalogResult<Box<dyn TableHandle>>;

    /// Creates a table with the given schema and partitioning.
    ///
    /// Fails with [`CatalogError::AlreadyExists`](crate::error::CatalogError::AlreadyExists)
    /// when the identity is taken, including when another writer won a
    /// creation race.
    async fn create_table(
        &self,
        table: &TableIdent,
        schema: TableSchema,
        partition_spec: PartitionSpec,
        properties: Vec<(String, String)>,
    ) -> CatalogResult<Box<dyn TableHandle>>;
}

/// Deferred construction of a catalog connection.
///
/// The sink is built before any connection is wanted; the loader is the
/// seam where the surrounding lifecycle triggers the one-time open.
#[async_trait::async_trait]
pub trait CatalogLoader: Send + Sync {
    async fn load_catalog(&self) -> CatalogResult<Arc<dyn TableCatalog>>;
}

/// A loaded table: its identity, the schema observed at load time, and
/// the entry point for transactional mutations.
pub trait TableHandle: Send {
    fn ident(&self) -> &TableIdent;

    fn schema(&self) -> &TableSchema;

    /// Starts a transaction against this table.
    fn new_transaction(&self) -> CatalogResult<Box<dyn TableTransaction>>;
}

/// An atomic batch of metadata or data mutations against one table.
///
/// Pending operations are staged locally and become visible to other
/// readers only after [`commit`](TableTransaction::commit) succeeds.
#[async_trait::async_trait]
pub trait TableTransaction: Send {
    /// Stages schema mutations within this transaction.
    fn update_schema(&mut self) -> Box<dyn PendingSchemaUpdate>;

    /// Stages a row deletion within this transaction.
    fn new_delete(&mut self) -> Box<dyn PendingDelete>;

    /// Commits every staged operation as a unit.
    async fn commit(self: Box<Self>) -> CatalogResult<()>;
}

/// A pending set of schema mutations.
///
/// Operations apply in the order they are declared; `commit` hands the
/// batch to the owning transaction without touching the catalog.
pub trait PendingSchemaUpdate: Send {
    fn add_column(&mut self, name: &str, field_type: FieldType);

    fn add_required_column(&mut self, name: &str, field_type: FieldType);

    fn delete_column(&mut self, name: &str);

    fn rename_column(&mut self, name: &str, new_name: &str);

    fn update_column(&mut self, name: &str, field_type: PrimitiveType);

    fn make_column_optional(&mut self, name: &str);

    fn move_first(&mut self, name: &str);

    fn move_before(&mut self, name: &str, anchor: &str);

    fn move_after(&mut self, name: &str, anchor: &str);

    fn commit(self: Box<Self>) -> CatalogResult<()>;
}

/// A pending row deletion.
pub trait PendingDelete: Send {
    /// Attaches a property to the produced snapshot, e.g. an application
    /// identifier for auditability.
    fn set(&mut self, key: &str, value: &str);

    fn delete_from_row_filter(&mut self, filter: RowFilter);

    fn commit(self: Box<Self>) -> CatalogResult<()>;
}

/// A row-level predicate for delete operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// Matches every row.
    AlwaysTrue,
}
