use arrow_schema::{DataType, Schema, SchemaRef};
use std::sync::Arc;

/// Resolve a declared SQL column type with SQLite's affinity rules.
///
/// Returns `None` for an empty declaration: such a column stores whatever
/// it is given, so its type can only be known from the values.
///
/// NUMERIC affinity (`DECIMAL(15,2)`, `NUMERIC`, ...) resolves to `Float64`
/// because SQLite stores whole-valued decimals as integers and the rest as
/// reals. Date and time declarations hold ISO-8601 text and booleans hold
/// integers.
pub fn declared_type(decl: &str) -> Option<DataType> {
    let decl = decl.trim().to_ascii_uppercase();
    if decl.is_empty() {
        None
    } else if decl.contains("INT") {
        Some(DataType::Int64)
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        Some(DataType::Utf8)
    } else if decl.contains("BLOB") {
        Some(DataType::Binary)
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        Some(DataType::Float64)
    } else if decl.contains("DATE") || decl.contains("TIME") {
        Some(DataType::Utf8)
    } else if decl.contains("BOOL") {
        Some(DataType::Int64)
    } else {
        Some(DataType::Float64)
    }
}

/// Column name, or `#index` when the index is out of range.
pub fn column_name(schema: &Schema, index: usize) -> String {
    schema
        .fields()
        .get(index)
        .map_or_else(|| format!("#{index}"), |f| f.name().clone())
}

/// Compact `[name: Type, ...]` rendering for error messages.
pub fn describe(schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| format!("{}: {}", f.name(), f.data_type()))
        .collect();
    format!("[{}]", columns.join(", "))
}

/// Equality check that short-circuits on a shared reference.
pub fn same_schema(a: &SchemaRef, b: &SchemaRef) -> bool {
    Arc::ptr_eq(a, b) || a == b
}
