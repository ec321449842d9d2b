use crate::ColumnDesc;
use arrow::datatypes::{DataType, Field, Schema};
use pgcsv_core::naming::quote_ident;
use pgcsv_core::TableRef;
use postgres::types::Type;

/// Arrow column types the frame reader decodes natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
}

impl ColumnKind {
    /// `None` for types that have to be cast to text server-side.
    pub fn native(ty: &Type) -> Option<Self> {
        Some(match *ty {
            Type::BOOL => ColumnKind::Boolean,
            Type::INT2 => ColumnKind::Int16,
            Type::INT4 => ColumnKind::Int32,
            Type::INT8 => ColumnKind::Int64,
            Type::FLOAT4 => ColumnKind::Float32,
            Type::FLOAT8 => ColumnKind::Float64,
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => ColumnKind::Utf8,
            _ => return None,
        })
    }

    pub fn for_pg(ty: &Type) -> Self {
        Self::native(ty).unwrap_or(ColumnKind::Utf8)
    }

    pub fn data_type(self) -> DataType {
        match self {
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Int16 => DataType::Int16,
            ColumnKind::Int32 => DataType::Int32,
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::Float32 => DataType::Float32,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Utf8 => DataType::Utf8,
        }
    }
}

pub fn frame_schema(columns: &[ColumnDesc]) -> (Schema, Vec<ColumnKind>) {
    let kinds: Vec<ColumnKind> = columns.iter().map(|c| ColumnKind::for_pg(&c.pg_type)).collect();
    let fields: Vec<Field> = columns
        .iter()
        .zip(&kinds)
        .map(|(c, k)| Field::new(c.name.clone(), k.data_type(), true))
        .collect();
    (Schema::new(fields), kinds)
}

/// `SELECT` list matching [`frame_schema`]: native columns as-is, the rest as `::text`.
pub fn projection_sql(table: &TableRef, columns: &[ColumnDesc]) -> String {
    let list: Vec<String> = columns
        .iter()
        .map(|c| {
            let ident = quote_ident(&c.name);
            match ColumnKind::native(&c.pg_type) {
                Some(_) => ident,
                None => format!("{}::text AS {}", ident, ident),
            }
        })
        .collect();
    format!("SELECT {} FROM {}", list.join(", "), table.quoted())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ty: Type) -> ColumnDesc {
        ColumnDesc { name: name.to_string(), pg_type: ty }
    }

    #[test]
    fn maps_native_types() {
        assert_eq!(ColumnKind::for_pg(&Type::INT4), ColumnKind::Int32);
        assert_eq!(ColumnKind::for_pg(&Type::FLOAT4), ColumnKind::Float32);
        assert_eq!(ColumnKind::for_pg(&Type::VARCHAR), ColumnKind::Utf8);
        assert_eq!(ColumnKind::native(&Type::NUMERIC), None);
        assert_eq!(ColumnKind::for_pg(&Type::TIMESTAMPTZ), ColumnKind::Utf8);
    }

    #[test]
    fn schema_keeps_column_order() {
        let (schema, kinds) = frame_schema(&[col("id", Type::INT8), col("price", Type::NUMERIC), col("ok", Type::BOOL)]);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "price", "ok"]);
        assert_eq!(kinds, vec![ColumnKind::Int64, ColumnKind::Utf8, ColumnKind::Boolean]);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
    }

    #[test]
    fn projection_casts_non_native_columns() {
        let sql = projection_sql(
            &TableRef::parse("public.orders"),
            &[col("id", Type::INT4), col("Order Date", Type::DATE)],
        );
        assert_eq!(sql, "SELECT \"id\", \"Order Date\"::text AS \"Order Date\" FROM \"public\".\"orders\"");
    }
}
