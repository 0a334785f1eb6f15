//! Data model shared by the transports and the accumulators.
//!
//! Columnar data is Arrow: batches are [`RecordBatch`]es and columns are
//! filled through [`ColumnBuilder`]. Row values are [`Value`]/[`ValueRef`].

mod builder;
mod schema;
mod value;

pub use arrow_array::RecordBatch;
pub use arrow_schema::{DataType, Field, Schema, SchemaRef};
pub use builder::{BatchBuilder, ColumnBuilder, INITIAL_ROW_CAPACITY};
pub use schema::{column_name, declared_type, describe, same_schema};
pub use value::{Value, ValueRef};
