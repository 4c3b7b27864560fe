use std::fmt;

use indexmap::IndexMap;
use skiff_catalog::ident::TableIdent;
use skiff_common::spec::{ColumnDef, DataType};

/// A table-definition change observed on the upstream change stream.
///
/// Events are immutable value objects with structural equality. Events
/// for the same table must be delivered to the applier in their arrival
/// order; the applier performs no reordering or batching across events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChangeEvent {
    /// A new table, with its full column list.
    CreateTable {
        table: TableIdent,
        columns: Vec<ColumnDef>,
    },
    /// One or more columns added, each with a requested position.
    AddColumn {
        table: TableIdent,
        columns: Vec<AddedColumn>,
    },
    /// Columns removed by name.
    DropColumn {
        table: TableIdent,
        names: Vec<String>,
    },
    /// Columns renamed; keys are the old names, in declaration order.
    RenameColumn {
        table: TableIdent,
        renames: IndexMap<String, String>,
    },
    /// Column types changed; keys are column names, in declaration order.
    AlterColumnType {
        table: TableIdent,
        changes: IndexMap<String, DataType>,
    },
    /// All rows removed; the schema is untouched.
    TruncateTable { table: TableIdent },
}

impl SchemaChangeEvent {
    pub fn table(&self) -> &TableIdent {
        match self {
            SchemaChangeEvent::CreateTable { table, .. } => table,
            SchemaChangeEvent::AddColumn { table, .. } => table,
            SchemaChangeEvent::DropColumn { table, .. } => table,
            SchemaChangeEvent::RenameColumn { table, .. } => table,
            SchemaChangeEvent::AlterColumnType { table, .. } => table,
            SchemaChangeEvent::TruncateTable { table } => table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SchemaChangeEvent::CreateTable { .. } => "create-table",
            SchemaChangeEvent::AddColumn { .. } => "add-column",
            SchemaChangeEvent::DropColumn { .. } => "drop-column",
            SchemaChangeEvent::RenameColumn { .. } => "rename-column",
            SchemaChangeEvent::AlterColumnType { .. } => "alter-column-type",
            SchemaChangeEvent::TruncateTable { .. } => "truncate-table",
        }
    }
}

impl fmt::Display for SchemaChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.kind(), self.table())
    }
}

/// A column to add, together with where it should land in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedColumn {
    pub column: ColumnDef,
    pub position: ColumnPosition,
}

impl AddedColumn {
    pub fn new(column: ColumnDef, position: ColumnPosition) -> Self {
        Self { column, position }
    }

    /// A column appended at the end of the schema.
    pub fn last(column: ColumnDef) -> Self {
        Self::new(column, ColumnPosition::Default)
    }
}

/// The requested position of an added column.
///
/// Positions are applied literally in declaration order; a later move
/// observes the result of an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    /// Append at the end of the schema.
    Default,
    /// Move to the front of the schema.
    First,
    /// Place directly before the named column.
    Before(String),
    /// Place directly after the named column.
    After(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = SchemaChangeEvent::TruncateTable {
            table: TableIdent::new("db", "orders"),
        };
        assert_eq!(event.kind(), "truncate-table");
        assert_eq!(event.table().to_string(), "db.orders");
        assert_eq!(event.to_string(), "truncate-table on db.orders");
    }

    #[test]
    fn test_structural_equality() {
        let make = || SchemaChangeEvent::DropColumn {
            table: TableIdent::new("db", "orders"),
            names: vec!["discount".to_string()],
        };
        assert_eq!(make(), make());
    }
}
