use serde::{Deserialize, Serialize};

/// Logical data types carried by upstream change events.
///
/// The enum avoids tuple variants in favor of named fields so its JSON
/// representation stays easy to read across language boundaries.
/// The catalog-native representation is a separate model owned by the
/// catalog crate; converting between the two is the sink's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DataType {
    /// A boolean datatype representing the values `true` and `false`.
    Boolean,
    /// A signed 8-bit integer.
    Int8,
    /// A signed 16-bit integer.
    Int16,
    /// A signed 32-bit integer.
    Int32,
    /// A signed 64-bit integer.
    Int64,
    /// A 32-bit floating point number.
    Float32,
    /// A 64-bit floating point number.
    Float64,
    /// Exact decimal value with precision and scale.
    Decimal {
        precision: u8,
        scale: i8,
    },
    /// A variable-length string in Unicode with UTF-8 encoding.
    Utf8,
    /// Opaque binary data of variable length.
    Binary,
    /// A date representing the elapsed time since UNIX epoch (1970-01-01) in days.
    Date,
    /// A time representing the elapsed time since midnight in microseconds.
    Time,
    /// A timestamp in microseconds, optionally zone-adjusted.
    Timestamp {
        adjusted_to_utc: bool,
    },
    /// A list of some logical data type with variable length.
    List {
        element: Box<DataType>,
        element_nullable: bool,
    },
    /// A map from keys of one logical data type to values of another.
    Map {
        key: Box<DataType>,
        value: Box<DataType>,
        value_nullable: bool,
    },
    /// A nested datatype that contains a number of sub-fields.
    Struct {
        fields: Vec<FieldDef>,
    },
}

impl DataType {
    /// Whether the type has no nested structure.
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            DataType::List { .. } | DataType::Map { .. } | DataType::Struct { .. }
        )
    }
}

/// A named field inside a [`DataType::Struct`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

/// A top-level column definition carried by schema-change events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}
