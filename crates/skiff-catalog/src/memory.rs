use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CatalogError, CatalogResult};
use crate::ident::TableIdent;
use crate::provider::{
    CatalogLoader, PendingDelete, PendingSchemaUpdate, RowFilter, TableCatalog, TableHandle,
    TableTransaction,
};
use crate::types::{FieldType, PartitionSpec, PrimitiveType, TableField, TableSchema};

/// An in-memory catalog with snapshot-isolated transactional commits.
///
/// Intended for tests and local development. Transactions stage their
/// mutations and apply them to the live table state only on commit;
/// readers never observe a partially applied transaction.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: Arc<Mutex<HashMap<TableIdent, TableState>>>,
}

#[derive(Debug, Clone)]
struct TableState {
    schema: TableSchema,
    partition_spec: PartitionSpec,
    properties: Vec<(String, String)>,
    row_count: u64,
    snapshot_log: Vec<SnapshotEntry>,
    last_field_id: i32,
}

/// A record of a committed data operation, with the properties attached
/// to it at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub operation: String,
    pub properties: Vec<(String, String)>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CatalogResult<MutexGuard<'_, HashMap<TableIdent, TableState>>> {
        self.tables
            .lock()
            .map_err(|_| CatalogError::Internal("catalog lock poisoned".to_string()))
    }

    /// Appends `count` rows to a table. Test/support surface; the real
    /// write path goes through data files, not the catalog.
    pub fn append_rows(&self, table: &TableIdent, count: u64) -> CatalogResult<()> {
        let mut tables = self.lock()?;
        let state = tables
            .get_mut(table)
            .ok_or_else(|| CatalogError::NotFound(format!("table: {table}")))?;
        state.row_count += count;
        Ok(())
    }

    pub fn row_count(&self, table: &TableIdent) -> CatalogResult<u64> {
        let tables = self.lock()?;
        let state = tables
            .get(table)
            .ok_or_else(|| CatalogError::NotFound(format!("table: {table}")))?;
        Ok(state.row_count)
    }

    pub fn table_properties(&self, table: &TableIdent) -> CatalogResult<Vec<(String, String)>> {
        let tables = self.lock()?;
        let state = tables
            .get(table)
            .ok_or_else(|| CatalogError::NotFound(format!("table: {table}")))?;
        Ok(state.properties.clone())
    }

    pub fn snapshot_log(&self, table: &TableIdent) -> CatalogResult<Vec<SnapshotEntry>> {
        let tables = self.lock()?;
        let state = tables
            .get(table)
            .ok_or_else(|| CatalogError::NotFound(format!("table: {table}")))?;
        Ok(state.snapshot_log.clone())
    }
}

#[async_trait::async_trait]
impl TableCatalog for MemoryCatalog {
    async fn table_exists(&self, table: &TableIdent) -> CatalogResult<bool> {
        Ok(self.lock()?.contains_key(table))
    }

    async fn load_table(&self, table: &TableIdent) -> CatalogResult<Box<dyn TableHandle>> {
        let schema = {
            let tables = self.lock()?;
            let state = tables
                .get(table)
                .ok_or_else(|| CatalogError::NotFound(format!("table: {table}")))?;
            state.schema.clone()
        };
        Ok(Box::new(MemoryTableHandle {
            ident: table.clone(),
            schema,
            tables: Arc::clone(&self.tables),
        }))
    }

    async fn create_table(
        &self,
        table: &TableIdent,
        schema: TableSchema,
        partition_spec: PartitionSpec,
        properties: Vec<(String, String)>,
    ) -> CatalogResult<Box<dyn TableHandle>> {
        {
            let mut tables = self.lock()?;
            if tables.contains_key(table) {
                return Err(CatalogError::AlreadyExists(format!("table: {table}")));
            }
            let mut last_field_id = 0;
            let mut fields = schema.fields;
            assign_field_ids(&mut fields, &mut last_field_id);
            tables.insert(
                table.clone(),
                TableState {
                    schema: TableSchema { fields },
                    partition_spec,
                    properties,
                    row_count: 0,
                    snapshot_log: vec![],
                    last_field_id,
                },
            );
        }
        self.load_table(table).await
    }
}

#[async_trait::async_trait]
impl CatalogLoader for MemoryCatalog {
    async fn load_catalog(&self) -> CatalogResult<Arc<dyn TableCatalog>> {
        Ok(Arc::new(self.clone()))
    }
}

fn assign_field_ids(fields: &mut [TableField], last_field_id: &mut i32) {
    for field in fields.iter_mut() {
        *last_field_id += 1;
        field.id = *last_field_id;
        if let FieldType::Struct(nested) = &mut field.field_type {
            assign_field_ids(&mut nested.fields, last_field_id);
        }
    }
}

struct MemoryTableHandle {
    ident: TableIdent,
    schema: TableSchema,
    tables: Arc<Mutex<HashMap<TableIdent, TableState>>>,
}

impl TableHandle for MemoryTableHandle {
    fn ident(&self) -> &TableIdent {
        &self.ident
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn new_transaction(&self) -> CatalogResult<Box<dyn TableTransaction>> {
        Ok(Box::new(MemoryTransaction {
            ident: self.ident.clone(),
            tables: Arc::clone(&self.tables),
            staged: Arc::new(Mutex::new(vec![])),
        }))
    }
}

#[derive(Debug, Clone)]
enum SchemaOp {
    AddColumn {
        name: String,
        field_type: FieldType,
        required: bool,
    },
    DeleteColumn(String),
    RenameColumn {
        name: String,
        new_name: String,
    },
    UpdateColumn {
        name: String,
        field_type: PrimitiveType,
    },
    MakeOptional(String),
    MoveFirst(String),
    MoveBefore {
        name: String,
        anchor: String,
    },
    MoveAfter {
        name: String,
        anchor: String,
    },
}

#[derive(Debug, Clone)]
enum StagedOp {
    Schema(Vec<SchemaOp>),
    Delete {
        filter: RowFilter,
        properties: Vec<(String, String)>,
    },
}

struct MemoryTransaction {
    ident: TableIdent,
    tables: Arc<Mutex<HashMap<TableIdent, TableState>>>,
    staged: Arc<Mutex<Vec<StagedOp>>>,
}

#[async_trait::async_trait]
impl TableTransaction for MemoryTransaction {
    fn update_schema(&mut self) -> Box<dyn PendingSchemaUpdate> {
        Box::new(MemorySchemaUpdate {
            ops: vec![],
            staged: Arc::clone(&self.staged),
        })
    }

    fn new_delete(&mut self) -> Box<dyn PendingDelete> {
        Box::new(MemoryDelete {
            filter: None,
            properties: vec![],
            staged: Arc::clone(&self.staged),
        })
    }

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        let staged = {
            let mut staged = self
                .staged
                .lock()
                .map_err(|_| CatalogError::Internal("transaction lock poisoned".to_string()))?;
            std::mem::take(&mut *staged)
        };
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| CatalogError::Internal("catalog lock poisoned".to_string()))?;
        let state = tables
            .get_mut(&self.ident)
            .ok_or_else(|| CatalogError::NotFound(format!("table: {}", self.ident)))?;

        // Apply against a copy so a failing operation leaves the live
        // state untouched.
        let mut updated = state.clone();
        for op in staged {
            match op {
                StagedOp::Schema(ops) => {
                    for op in ops {
                        apply_schema_op(&mut updated, op)?;
                    }
                }
                StagedOp::Delete { filter, properties } => {
                    match filter {
                        RowFilter::AlwaysTrue => updated.row_count = 0,
                    }
                    updated.snapshot_log.push(SnapshotEntry {
                        operation: "delete".to_string(),
                        properties,
                    });
                }
            }
        }
        *state = updated;
        Ok(())
    }
}

fn apply_schema_op(state: &mut TableState, op: SchemaOp) -> CatalogResult<()> {
    let schema = &mut state.schema;
    match op {
        SchemaOp::AddColumn {
            name,
            field_type,
            required,
        } => {
            if schema.contains(&name) {
                return Err(CatalogError::AlreadyExists(format!("column: {name}")));
            }
            let mut fields = vec![TableField {
                id: 0,
                name,
                field_type,
                required,
            }];
            assign_field_ids(&mut fields, &mut state.last_field_id);
            schema.fields.extend(fields);
        }
        SchemaOp::DeleteColumn(name) => {
            let position = schema
                .position(&name)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {name}")))?;
            schema.fields.remove(position);
        }
        SchemaOp::RenameColumn { name, new_name } => {
            if schema.contains(&new_name) {
                return Err(CatalogError::AlreadyExists(format!("column: {new_name}")));
            }
            let position = schema
                .position(&name)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {name}")))?;
            schema.fields[position].name = new_name;
        }
        SchemaOp::UpdateColumn { name, field_type } => {
            let position = schema
                .position(&name)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {name}")))?;
            schema.fields[position].field_type = FieldType::Primitive(field_type);
        }
        SchemaOp::MakeOptional(name) => {
            let position = schema
                .position(&name)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {name}")))?;
            schema.fields[position].required = false;
        }
        SchemaOp::MoveFirst(name) => {
            let position = schema
                .position(&name)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {name}")))?;
            let field = schema.fields.remove(position);
            schema.fields.insert(0, field);
        }
        SchemaOp::MoveBefore { name, anchor } => {
            let position = schema
                .position(&name)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {name}")))?;
            let field = schema.fields.remove(position);
            let anchor_position = schema
                .position(&anchor)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {anchor}")))?;
            schema.fields.insert(anchor_position, field);
        }
        SchemaOp::MoveAfter { name, anchor } => {
            let position = schema
                .position(&name)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {name}")))?;
            let field = schema.fields.remove(position);
            let anchor_position = schema
                .position(&anchor)
                .ok_or_else(|| CatalogError::NotFound(format!("column: {anchor}")))?;
            schema.fields.insert(anchor_position + 1, field);
        }
    }
    Ok(())
}

struct MemorySchemaUpdate {
    ops: Vec<SchemaOp>,
    staged: Arc<Mutex<Vec<StagedOp>>>,
}

impl PendingSchemaUpdate for MemorySchemaUpdate {
    fn add_column(&mut self, name: &str, field_type: FieldType) {
        self.ops.push(SchemaOp::AddColumn {
            name: name.to_string(),
            field_type,
            required: false,
        });
    }

    fn add_required_column(&mut self, name: &str, field_type: FieldType) {
        self.ops.push(SchemaOp::AddColumn {
            name: name.to_string(),
            field_type,
            required: true,
        });
    }

    fn delete_column(&mut self, name: &str) {
        self.ops.push(SchemaOp::DeleteColumn(name.to_string()));
    }

    fn rename_column(&mut self, name: &str, new_name: &str) {
        self.ops.push(SchemaOp::RenameColumn {
            name: name.to_string(),
            new_name: new_name.to_string(),
        });
    }

    fn update_column(&mut self, name: &str, field_type: PrimitiveType) {
        self.ops.push(SchemaOp::UpdateColumn {
            name: name.to_string(),
            field_type,
        });
    }

    fn make_column_optional(&mut self, name: &str) {
        self.ops.push(SchemaOp::MakeOptional(name.to_string()));
    }

    fn move_first(&mut self, name: &str) {
        self.ops.push(SchemaOp::MoveFirst(name.to_string()));
    }

    fn move_before(&mut self, name: &str, anchor: &str) {
        self.ops.push(SchemaOp::MoveBefore {
            name: name.to_string(),
            anchor: anchor.to_string(),
        });
    }

    fn move_after(&mut self, name: &str, anchor: &str) {
        self.ops.push(SchemaOp::MoveAfter {
            name: name.to_string(),
            anchor: anchor.to_string(),
        });
    }

    fn commit(self: Box<Self>) -> CatalogResult<()> {
        let mut staged = self
            .staged
            .lock()
            .map_err(|_| CatalogError::Internal("transaction lock poisoned".to_string()))?;
        staged.push(StagedOp::Schema(self.ops));
        Ok(())
    }
}

struct MemoryDelete {
    filter: Option<RowFilter>,
    properties: Vec<(String, String)>,
    staged: Arc<Mutex<Vec<StagedOp>>>,
}

impl PendingDelete for MemoryDelete {
    fn set(&mut self, key: &str, value: &str) {
        self.properties.push((key.to_string(), value.to_string()));
    }

    fn delete_from_row_filter(&mut self, filter: RowFilter) {
        self.filter = Some(filter);
    }

    fn commit(self: Box<Self>) -> CatalogResult<()> {
        let filter = self.filter.ok_or_else(|| {
            CatalogError::InvalidArgument("delete committed without a row filter".to_string())
        })?;
        let mut staged = self
            .staged
            .lock()
            .map_err(|_| CatalogError::Internal("transaction lock poisoned".to_string()))?;
        staged.push(StagedOp::Delete {
            filter,
            properties: self.properties,
        });
        Ok(())
    }
}
