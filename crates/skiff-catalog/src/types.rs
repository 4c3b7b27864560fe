use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Catalog-native primitive types.
///
/// This is the representation the table store persists; the logical
/// types carried by change events are converted into it at the sink
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PrimitiveType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Decimal { precision: u8, scale: i8 },
    Date,
    Time,
    Timestamp,
    Timestamptz,
    String,
    Binary,
}

/// The type of a table field: a primitive or a nested composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Primitive(PrimitiveType),
    Struct(StructType),
    List(ListType),
    Map(MapType),
}

impl FieldType {
    /// The primitive representation of the type.
    ///
    /// Column type updates accept primitives only; nested types cannot
    /// be retyped in place.
    pub fn as_primitive(&self) -> CatalogResult<PrimitiveType> {
        match self {
            FieldType::Primitive(primitive) => Ok(*primitive),
            other => Err(CatalogError::InvalidArgument(format!(
                "not a primitive type: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructType {
    pub fields: Vec<TableField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListType {
    pub element: Box<FieldType>,
    pub element_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapType {
    pub key: Box<FieldType>,
    pub value: Box<FieldType>,
    pub value_required: bool,
}

/// A field in a table schema.
///
/// Field ids are assigned by the catalog when the field is created and
/// stay stable across renames and moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableField {
    pub id: i32,
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

/// An ordered set of named fields describing a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub fields: Vec<TableField>,
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&TableField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// How a table's rows are split across partitions.
///
/// The sink only ever creates unpartitioned tables; richer specs belong
/// to the catalog implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub fields: Vec<String>,
}

impl PartitionSpec {
    pub fn unpartitioned() -> Self {
        Self::default()
    }

    pub fn is_unpartitioned(&self) -> bool {
        self.fields.is_empty()
    }
}
