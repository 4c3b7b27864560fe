use std::sync::Arc;

use indexmap::IndexMap;
use skiff_catalog::ident::TableIdent;
use skiff_catalog::provider::{CatalogLoader, RowFilter, TableCatalog};
use skiff_catalog::types::PartitionSpec;
use skiff_common::config::TableDefaults;
use skiff_common::spec::{ColumnDef, DataType};

use crate::convert;
use crate::error::{SinkError, SinkResult};
use crate::events::{AddedColumn, ColumnPosition, SchemaChangeEvent};

/// Snapshot property attached to delete operations issued on truncate,
/// so downstream audits can attribute the row removal.
const TRUNCATE_APP_ID: (&str, &str) = ("app.id", "cdc-truncate");

/// Applies schema-change events to the table catalog.
///
/// The applier is built cheaply and connects on [`open`](Self::open),
/// which the surrounding lifecycle invokes once. Each event is applied
/// against a freshly loaded table, so the live schema (never a cached
/// copy) decides which parts of the event are still outstanding. That
/// filtering makes every operation idempotent under replay and tolerant
/// of catalog state that has already advanced past the event.
///
/// Events for one table must arrive in order on a single logical thread
/// of control; the applier performs no internal serialization.
pub struct SchemaEvolutionApplier {
    loader: Arc<dyn CatalogLoader>,
    table_defaults: TableDefaults,
    catalog: Option<Arc<dyn TableCatalog>>,
}

impl SchemaEvolutionApplier {
    pub fn new(loader: Arc<dyn CatalogLoader>, table_defaults: TableDefaults) -> Self {
        Self {
            loader,
            table_defaults,
            catalog: None,
        }
    }

    /// Opens the catalog connection. Idempotent; the connection is held
    /// for the applier's lifetime.
    pub async fn open(&mut self) -> SinkResult<()> {
        if self.catalog.is_none() {
            self.catalog = Some(self.loader.load_catalog().await?);
        }
        Ok(())
    }

    fn catalog(&self) -> SinkResult<&Arc<dyn TableCatalog>> {
        self.catalog.as_ref().ok_or(SinkError::ApplierNotOpened)
    }

    /// Applies one schema-change event.
    ///
    /// Any failure during dispatch is wrapped into
    /// [`SinkError::Apply`] carrying the triggering event; the event is
    /// not retried here.
    pub async fn apply(&self, event: &SchemaChangeEvent) -> SinkResult<()> {
        let catalog = self.catalog()?;
        let result = match event {
            SchemaChangeEvent::CreateTable { table, columns } => {
                self.apply_create_table(catalog, table, columns).await
            }
            SchemaChangeEvent::AddColumn { table, columns } => {
                self.apply_add_column(catalog, table, columns).await
            }
            SchemaChangeEvent::DropColumn { table, names } => {
                self.apply_drop_column(catalog, table, names).await
            }
            SchemaChangeEvent::RenameColumn { table, renames } => {
                self.apply_rename_column(catalog, table, renames).await
            }
            SchemaChangeEvent::AlterColumnType { table, changes } => {
                self.apply_alter_column_type(catalog, table, changes).await
            }
            SchemaChangeEvent::TruncateTable { table } => {
                self.apply_truncate_table(catalog, table).await
            }
        };
        result.map_err(SinkError::wrap_apply(event))
    }

    async fn apply_create_table(
        &self,
        catalog: &Arc<dyn TableCatalog>,
        table: &TableIdent,
        columns: &[ColumnDef],
    ) -> SinkResult<()> {
        if catalog.table_exists(table).await? {
            // An out-of-band migration may have created a compatible
            // table already; report requested columns it lacks, but do
            // not mutate it.
            let handle = catalog.load_table(table).await?;
            let live = handle.schema();
            for column in columns {
                if !live.contains(&column.name) {
                    log::warn!(
                        "column {} will not be found in the live schema of {table}",
                        column.name
                    );
                }
            }
            return Ok(());
        }

        let schema = convert::to_table_schema(columns);
        let properties = self
            .table_defaults
            .table_properties(&table.namespace.to_string());
        match catalog
            .create_table(table, schema, PartitionSpec::unpartitioned(), properties)
            .await
        {
            Ok(_) => {
                log::info!("created table {table}");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                log::warn!("table {table} was created concurrently by another writer: {e}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_add_column(
        &self,
        catalog: &Arc<dyn TableCatalog>,
        table: &TableIdent,
        columns: &[AddedColumn],
    ) -> SinkResult<()> {
        let handle = catalog.load_table(table).await?;
        let live = handle.schema();

        // Replay guard: a column that already exists live was applied
        // by an earlier delivery of this event.
        let additions: Vec<&AddedColumn> = columns
            .iter()
            .filter(|added| !live.contains(&added.column.name))
            .collect();

        let mut transaction = handle.new_transaction()?;
        let mut update = transaction.update_schema();
        for added in additions {
            let column = &added.column;
            let field_type = convert::to_field_type(&column.data_type);
            if column.nullable {
                update.add_column(&column.name, field_type);
            } else {
                update.add_required_column(&column.name, field_type);
            }
            match &added.position {
                ColumnPosition::First => update.move_first(&column.name),
                ColumnPosition::Before(anchor) => update.move_before(&column.name, anchor),
                ColumnPosition::After(anchor) => update.move_after(&column.name, anchor),
                ColumnPosition::Default => {}
            }
        }
        update.commit()?;
        transaction.commit().await?;
        log::info!("applied add-column to {table}");
        Ok(())
    }

    async fn apply_drop_column(
        &self,
        catalog: &Arc<dyn TableCatalog>,
        table: &TableIdent,
        names: &[String],
    ) -> SinkResult<()> {
        let handle = catalog.load_table(table).await?;
        let live = handle.schema();
        let names: Vec<&String> = names.iter().filter(|name| live.contains(name)).collect();

        let mut transaction = handle.new_transaction()?;
        let mut update = transaction.update_schema();
        for name in names {
            update.delete_column(name);
        }
        update.commit()?;
        transaction.commit().await?;
        log::info!("applied drop-column to {table}");
        Ok(())
    }

    async fn apply_rename_column(
        &self,
        catalog: &Arc<dyn TableCatalog>,
        table: &TableIdent,
        renames: &IndexMap<String, String>,
    ) -> SinkResult<()> {
        let handle = catalog.load_table(table).await?;
        let live = handle.schema();

        // Filter on the source name only; a destination collision is
        // the catalog's constraint to enforce.
        let renames: Vec<(&String, &String)> = renames
            .iter()
            .filter(|(old, _)| live.contains(old))
            .collect();

        let mut transaction = handle.new_transaction()?;
        let mut update = transaction.update_schema();
        for (old, new) in renames {
            update.rename_column(old, new);
        }
        update.commit()?;
        transaction.commit().await?;
        log::info!("applied rename-column to {table}");
        Ok(())
    }

    async fn apply_alter_column_type(
        &self,
        catalog: &Arc<dyn TableCatalog>,
        table: &TableIdent,
        changes: &IndexMap<String, DataType>,
    ) -> SinkResult<()> {
        let handle = catalog.load_table(table).await?;
        let live = handle.schema();
        let changes: Vec<(&String, &DataType)> = changes
            .iter()
            .filter(|(name, _)| live.contains(name))
            .collect();

        let mut transaction = handle.new_transaction()?;
        let mut update = transaction.update_schema();
        for (name, data_type) in changes {
            // Column type updates are primitive-only in the store's
            // transaction protocol.
            let field_type = convert::to_field_type(data_type).as_primitive().map_err(|_| {
                SinkError::UnsupportedEvent(format!(
                    "cannot retype column {name} of {table} to a nested type"
                ))
            })?;
            update.update_column(name, field_type);
            // Widening-only migration policy: a retyped column always
            // relaxes to nullable so historical rows stay valid.
            update.make_column_optional(name);
        }
        update.commit()?;
        transaction.commit().await?;
        log::info!("applied alter-column-type to {table}");
        Ok(())
    }

    async fn apply_truncate_table(
        &self,
        catalog: &Arc<dyn TableCatalog>,
        table: &TableIdent,
    ) -> SinkResult<()> {
        let handle = catalog.load_table(table).await?;
        let mut transaction = handle.new_transaction()?;
        let mut delete = transaction.new_delete();
        delete.set(TRUNCATE_APP_ID.0, TRUNCATE_APP_ID.1);
        delete.delete_from_row_filter(RowFilter::AlwaysTrue);
        delete.commit()?;
        transaction.commit().await?;
        log::info!("applied truncate-table to {table}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use skiff_catalog::memory::MemoryCatalog;
    use skiff_catalog::types::{FieldType, PrimitiveType};
    use skiff_common::config::TableDefaults;
    use skiff_common::spec::ColumnDef;

    use super::*;

    fn orders() -> TableIdent {
        TableIdent::new("db", "orders")
    }

    fn baseline_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("a", DataType::Int64, false),
            ColumnDef::new("b", DataType::Utf8, true),
            ColumnDef::new("c", DataType::Int32, true),
        ]
    }

    async fn opened_applier(catalog: &MemoryCatalog) -> SchemaEvolutionApplier {
        let mut applier =
            SchemaEvolutionApplier::new(Arc::new(catalog.clone()), TableDefaults::default());
        applier.open().await.unwrap();
        applier
    }

    async fn applier_with_baseline(catalog: &MemoryCatalog) -> SchemaEvolutionApplier {
        let applier = opened_applier(catalog).await;
        applier
            .apply(&SchemaChangeEvent::CreateTable {
                table: orders(),
                columns: baseline_columns(),
            })
            .await
            .unwrap();
        applier
    }

    async fn live_columns(catalog: &MemoryCatalog) -> Vec<String> {
        let handle = catalog.load_table(&orders()).await.unwrap();
        handle.schema().column_names().map(String::from).collect()
    }

    #[tokio::test]
    async fn test_apply_before_open_fails() {
        let catalog = MemoryCatalog::new();
        let applier =
            SchemaEvolutionApplier::new(Arc::new(catalog), TableDefaults::default());
        let result = applier
            .apply(&SchemaChangeEvent::TruncateTable { table: orders() })
            .await;
        assert!(matches!(result, Err(SinkError::ApplierNotOpened)));
    }

    #[tokio::test]
    async fn test_create_table() {
        let catalog = MemoryCatalog::new();
        applier_with_baseline(&catalog).await;
        assert_eq!(live_columns(&catalog).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_create_table_applies_default_properties() {
        let catalog = MemoryCatalog::new();
        let mut namespaces = std::collections::HashMap::new();
        namespaces.insert(
            "db".to_string(),
            std::collections::HashMap::from([("owner".to_string(), "cdc".to_string())]),
        );
        let defaults = TableDefaults {
            properties: std::collections::HashMap::from([(
                "write.format".to_string(),
                "parquet".to_string(),
            )]),
            namespaces,
        };
        let mut applier = SchemaEvolutionApplier::new(Arc::new(catalog.clone()), defaults);
        applier.open().await.unwrap();
        applier
            .apply(&SchemaChangeEvent::CreateTable {
                table: orders(),
                columns: baseline_columns(),
            })
            .await
            .unwrap();

        let properties = catalog.table_properties(&orders()).unwrap();
        assert!(properties.contains(&("owner".to_string(), "cdc".to_string())));
        assert!(properties.contains(&("write.format".to_string(), "parquet".to_string())));
    }

    #[tokio::test]
    async fn test_create_existing_table_is_non_destructive() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;

        // Replay the create with an extra requested column; the live
        // table must stay untouched and the event must not fail.
        let mut columns = baseline_columns();
        columns.push(ColumnDef::new("d", DataType::Utf8, true));
        applier
            .apply(&SchemaChangeEvent::CreateTable {
                table: orders(),
                columns,
            })
            .await
            .unwrap();
        assert_eq!(live_columns(&catalog).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_add_column_positions() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;

        applier
            .apply(&SchemaChangeEvent::AddColumn {
                table: orders(),
                columns: vec![
                    AddedColumn::new(
                        ColumnDef::new("d", DataType::Utf8, true),
                        ColumnPosition::First,
                    ),
                    AddedColumn::new(
                        ColumnDef::new("e", DataType::Utf8, true),
                        ColumnPosition::Before("b".to_string()),
                    ),
                    AddedColumn::new(
                        ColumnDef::new("f", DataType::Utf8, true),
                        ColumnPosition::After("a".to_string()),
                    ),
                    AddedColumn::last(ColumnDef::new("g", DataType::Utf8, true)),
                ],
            })
            .await
            .unwrap();

        // Position moves replay literally, each observing the previous
        // one's result.
        assert_eq!(
            live_columns(&catalog).await,
            vec!["d", "a", "f", "e", "b", "c", "g"]
        );
    }

    #[tokio::test]
    async fn test_add_column_anchored_on_added_column() {
        let catalog = MemoryCatalog::new();
        let applier = opened_applier(&catalog).await;
        applier
            .apply(&SchemaChangeEvent::CreateTable {
                table: orders(),
                columns: vec![
                    ColumnDef::new("a", DataType::Int64, false),
                    ColumnDef::new("b", DataType::Utf8, true),
                ],
            })
            .await
            .unwrap();

        applier
            .apply(&SchemaChangeEvent::AddColumn {
                table: orders(),
                columns: vec![
                    AddedColumn::new(
                        ColumnDef::new("c1", DataType::Utf8, true),
                        ColumnPosition::First,
                    ),
                    AddedColumn::new(
                        ColumnDef::new("c2", DataType::Utf8, true),
                        ColumnPosition::After("c1".to_string()),
                    ),
                ],
            })
            .await
            .unwrap();

        assert_eq!(live_columns(&catalog).await, vec!["c1", "c2", "a", "b"]);
    }

    #[tokio::test]
    async fn test_add_column_nullability() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;
        applier
            .apply(&SchemaChangeEvent::AddColumn {
                table: orders(),
                columns: vec![
                    AddedColumn::last(ColumnDef::new("opt", DataType::Utf8, true)),
                    AddedColumn::last(ColumnDef::new("req", DataType::Int64, false)),
                ],
            })
            .await
            .unwrap();

        let handle = catalog.load_table(&orders()).await.unwrap();
        assert!(!handle.schema().field("opt").unwrap().required);
        assert!(handle.schema().field("req").unwrap().required);
    }

    #[tokio::test]
    async fn test_add_column_idempotent_replay() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;
        let event = SchemaChangeEvent::AddColumn {
            table: orders(),
            columns: vec![AddedColumn::new(
                ColumnDef::new("d", DataType::Utf8, true),
                ColumnPosition::First,
            )],
        };

        applier.apply(&event).await.unwrap();
        let after_first = live_columns(&catalog).await;
        applier.apply(&event).await.unwrap();
        assert_eq!(live_columns(&catalog).await, after_first);
    }

    #[tokio::test]
    async fn test_drop_column_idempotent_replay() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;
        let event = SchemaChangeEvent::DropColumn {
            table: orders(),
            names: vec!["b".to_string(), "missing".to_string()],
        };

        applier.apply(&event).await.unwrap();
        assert_eq!(live_columns(&catalog).await, vec!["a", "c"]);
        applier.apply(&event).await.unwrap();
        assert_eq!(live_columns(&catalog).await, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_rename_column_idempotent_replay() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;
        let event = SchemaChangeEvent::RenameColumn {
            table: orders(),
            renames: IndexMap::from([("b".to_string(), "label".to_string())]),
        };

        applier.apply(&event).await.unwrap();
        assert_eq!(live_columns(&catalog).await, vec!["a", "label", "c"]);
        // On replay the old name is gone, so the entry filters out.
        applier.apply(&event).await.unwrap();
        assert_eq!(live_columns(&catalog).await, vec!["a", "label", "c"]);
    }

    #[tokio::test]
    async fn test_rename_destination_collision_fails_via_catalog() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;
        let event = SchemaChangeEvent::RenameColumn {
            table: orders(),
            renames: IndexMap::from([("b".to_string(), "a".to_string())]),
        };

        let result = applier.apply(&event).await;
        match result {
            Err(SinkError::Apply { event: wrapped, .. }) => assert_eq!(*wrapped, event),
            other => panic!("expected apply failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_alter_column_type_widens_nullability() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;
        let event = SchemaChangeEvent::AlterColumnType {
            table: orders(),
            changes: IndexMap::from([("a".to_string(), DataType::Utf8)]),
        };

        applier.apply(&event).await.unwrap();

        let handle = catalog.load_table(&orders()).await.unwrap();
        let field = handle.schema().field("a").unwrap();
        assert_eq!(
            field.field_type,
            FieldType::Primitive(PrimitiveType::String)
        );
        // Retyping always relaxes the column to nullable.
        assert!(!field.required);

        // Replay is a no-op: the column still exists, so it is retyped
        // to the same type again with the same outcome.
        applier.apply(&event).await.unwrap();
        let handle = catalog.load_table(&orders()).await.unwrap();
        assert!(!handle.schema().field("a").unwrap().required);
    }

    #[tokio::test]
    async fn test_alter_column_type_rejects_nested_types() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;
        let event = SchemaChangeEvent::AlterColumnType {
            table: orders(),
            changes: IndexMap::from([(
                "a".to_string(),
                DataType::List {
                    element: Box::new(DataType::Int64),
                    element_nullable: true,
                },
            )]),
        };
        match applier.apply(&event).await {
            Err(SinkError::Apply { source, .. }) => {
                assert!(matches!(*source, SinkError::UnsupportedEvent(_)));
            }
            other => panic!("expected apply failure, got {other:?}"),
        }

        // The failed event must not have mutated the catalog.
        let handle = catalog.load_table(&orders()).await.unwrap();
        let field = handle.schema().field("a").unwrap();
        assert_eq!(field.field_type, FieldType::Primitive(PrimitiveType::Long));
        assert!(field.required);
    }

    #[tokio::test]
    async fn test_truncate_table_clears_rows_preserves_schema() {
        let catalog = MemoryCatalog::new();
        let applier = applier_with_baseline(&catalog).await;
        catalog.append_rows(&orders(), 128).unwrap();

        applier
            .apply(&SchemaChangeEvent::TruncateTable { table: orders() })
            .await
            .unwrap();

        assert_eq!(catalog.row_count(&orders()).unwrap(), 0);
        assert_eq!(live_columns(&catalog).await, vec!["a", "b", "c"]);

        let log = catalog.snapshot_log(&orders()).unwrap();
        assert_eq!(
            log.last().unwrap().properties,
            vec![("app.id".to_string(), "cdc-truncate".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_table_wraps_into_apply_failure() {
        let catalog = MemoryCatalog::new();
        let applier = opened_applier(&catalog).await;
        let event = SchemaChangeEvent::DropColumn {
            table: TableIdent::new("db", "missing"),
            names: vec!["a".to_string()],
        };
        match applier.apply(&event).await {
            Err(SinkError::Apply { event: wrapped, source }) => {
                assert_eq!(*wrapped, event);
                assert!(matches!(*source, SinkError::Catalog(_)));
            }
            other => panic!("expected apply failure, got {other:?}"),
        }
    }
}
