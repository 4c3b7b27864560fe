use skiff_catalog::types::{
    FieldType, ListType, MapType, PrimitiveType, StructType, TableField, TableSchema,
};
use skiff_common::spec::{ColumnDef, DataType, FieldDef};

/// Converts a logical event type into the catalog-native representation.
///
/// Field ids on nested struct fields are left at zero; the catalog
/// assigns real ids when the fields are created.
pub fn to_field_type(data_type: &DataType) -> FieldType {
    match data_type {
        DataType::Boolean => FieldType::Primitive(PrimitiveType::Boolean),
        DataType::Int8 | DataType::Int16 | DataType::Int32 => {
            FieldType::Primitive(PrimitiveType::Int)
        }
        DataType::Int64 => FieldType::Primitive(PrimitiveType::Long),
        DataType::Float32 => FieldType::Primitive(PrimitiveType::Float),
        DataType::Float64 => FieldType::Primitive(PrimitiveType::Double),
        DataType::Decimal { precision, scale } => FieldType::Primitive(PrimitiveType::Decimal {
            precision: *precision,
            scale: *scale,
        }),
        DataType::Utf8 => FieldType::Primitive(PrimitiveType::String),
        DataType::Binary => FieldType::Primitive(PrimitiveType::Binary),
        DataType::Date => FieldType::Primitive(PrimitiveType::Date),
        DataType::Time => FieldType::Primitive(PrimitiveType::Time),
        DataType::Timestamp { adjusted_to_utc } => {
            if *adjusted_to_utc {
                FieldType::Primitive(PrimitiveType::Timestamptz)
            } else {
                FieldType::Primitive(PrimitiveType::Timestamp)
            }
        }
        DataType::List {
            element,
            element_nullable,
        } => FieldType::List(ListType {
            element: Box::new(to_field_type(element)),
            element_required: !element_nullable,
        }),
        DataType::Map {
            key,
            value,
            value_nullable,
        } => FieldType::Map(MapType {
            key: Box::new(to_field_type(key)),
            value: Box::new(to_field_type(value)),
            value_required: !value_nullable,
        }),
        DataType::Struct { fields } => FieldType::Struct(StructType {
            fields: fields.iter().map(to_table_field).collect(),
        }),
    }
}

fn to_table_field(field: &FieldDef) -> TableField {
    TableField {
        id: 0,
        name: field.name.clone(),
        field_type: to_field_type(&field.data_type),
        required: !field.nullable,
    }
}

/// Converts a full requested column list into a catalog schema.
pub fn to_table_schema(columns: &[ColumnDef]) -> TableSchema {
    TableSchema {
        fields: columns
            .iter()
            .map(|column| TableField {
                id: 0,
                name: column.name.clone(),
                field_type: to_field_type(&column.data_type),
                required: !column.nullable,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_conversion() {
        assert_eq!(
            to_field_type(&DataType::Int16),
            FieldType::Primitive(PrimitiveType::Int)
        );
        assert_eq!(
            to_field_type(&DataType::Int64),
            FieldType::Primitive(PrimitiveType::Long)
        );
        assert_eq!(
            to_field_type(&DataType::Timestamp {
                adjusted_to_utc: true
            }),
            FieldType::Primitive(PrimitiveType::Timestamptz)
        );
        assert_eq!(
            to_field_type(&DataType::Decimal {
                precision: 38,
                scale: 10
            }),
            FieldType::Primitive(PrimitiveType::Decimal {
                precision: 38,
                scale: 10
            })
        );
    }

    #[test]
    fn test_nested_conversion_is_not_primitive() {
        let field_type = to_field_type(&DataType::Struct {
            fields: vec![FieldDef {
                name: "inner".to_string(),
                data_type: DataType::Utf8,
                nullable: true,
            }],
        });
        assert!(field_type.as_primitive().is_err());
    }

    #[test]
    fn test_schema_conversion_keeps_order_and_nullability() {
        let schema = to_table_schema(&[
            ColumnDef::new("id", DataType::Int64, false),
            ColumnDef::new("name", DataType::Utf8, true),
        ]);
        assert_eq!(schema.column_names().collect::<Vec<_>>(), vec!["id", "name"]);
        assert!(schema.field("id").unwrap().required);
        assert!(!schema.field("name").unwrap().required);
    }
}
