use super::schema::column_name;
use super::ValueRef;
use crate::error::{Error, Result};
use crate::stream::RowCursor;
use arrow_array::builder::{
    ArrayBuilder, BinaryBuilder, Float64Builder, Int64Builder, NullBuilder, StringBuilder,
};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int64Type};
use arrow_array::{Array, ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::{DataType, FieldRef, Schema, SchemaRef};
use std::sync::Arc;

/// Row capacity of a column's first allocation when growing from empty.
pub const INITIAL_ROW_CAPACITY: usize = 1024;

/// Growable Arrow column of one of the types a SQL result can produce.
#[derive(Debug)]
pub enum ColumnBuilder {
    /// Only nulls have been seen for this column.
    Null(NullBuilder),
    Int64(Int64Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
    Binary(BinaryBuilder),
}

impl ColumnBuilder {
    pub fn with_capacity(data_type: &DataType, rows: usize) -> Result<Self> {
        Ok(match data_type {
            DataType::Null => Self::Null(NullBuilder::new()),
            DataType::Int64 => Self::Int64(Int64Builder::with_capacity(rows)),
            DataType::Float64 => Self::Float64(Float64Builder::with_capacity(rows)),
            DataType::Utf8 => Self::Utf8(StringBuilder::with_capacity(rows, 0)),
            DataType::Binary => Self::Binary(BinaryBuilder::with_capacity(rows, 0)),
            other => {
                return Err(Error::schema_mismatch(format!(
                    "unsupported column type {other}"
                )))
            }
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Null(_) => DataType::Null,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
            Self::Binary(_) => DataType::Binary,
        }
    }

    fn inner(&self) -> &dyn ArrayBuilder {
        match self {
            Self::Null(b) => b,
            Self::Int64(b) => b,
            Self::Float64(b) => b,
            Self::Utf8(b) => b,
            Self::Binary(b) => b,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ArrayBuilder {
        match self {
            Self::Null(b) => b,
            Self::Int64(b) => b,
            Self::Float64(b) => b,
            Self::Utf8(b) => b,
            Self::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.inner().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append_null(&mut self) {
        match self {
            Self::Null(b) => b.append_null(),
            Self::Int64(b) => b.append_null(),
            Self::Float64(b) => b.append_null(),
            Self::Utf8(b) => b.append_null(),
            Self::Binary(b) => b.append_null(),
        }
    }

    /// Append one value. Integers are accepted into a `Float64` column.
    ///
    /// On a type conflict, returns the type of the rejected value.
    pub fn append_value(&mut self, value: ValueRef<'_>) -> std::result::Result<(), DataType> {
        if value.is_null() {
            self.append_null();
            return Ok(());
        }
        match (self, value) {
            (Self::Int64(b), ValueRef::Integer(v)) => b.append_value(v),
            (Self::Float64(b), ValueRef::Real(v)) => b.append_value(v),
            (Self::Float64(b), ValueRef::Integer(v)) => b.append_value(v as f64),
            (Self::Utf8(b), ValueRef::Text(v)) => b.append_value(v),
            (Self::Binary(b), ValueRef::Blob(v)) => b.append_value(v),
            (_, other) => return Err(other.data_type()),
        }
        Ok(())
    }

    /// Append every row of `array`, which must have this column's type.
    ///
    /// On a type conflict, returns the array's type.
    pub fn append_array(&mut self, array: &dyn Array) -> std::result::Result<(), DataType> {
        let mismatch = || array.data_type().clone();
        match self {
            Self::Null(b) if array.data_type() == &DataType::Null => b.append_nulls(array.len()),
            Self::Int64(b) => {
                let values = array.as_primitive_opt::<Int64Type>().ok_or_else(mismatch)?;
                b.extend(values.iter());
            }
            Self::Float64(b) => {
                let values = array.as_primitive_opt::<Float64Type>().ok_or_else(mismatch)?;
                b.extend(values.iter());
            }
            Self::Utf8(b) => {
                let values = array.as_string_opt::<i32>().ok_or_else(mismatch)?;
                b.extend(values.iter());
            }
            Self::Binary(b) => {
                let values = array.as_binary_opt::<i32>().ok_or_else(mismatch)?;
                b.extend(values.iter());
            }
            Self::Null(_) => return Err(mismatch()),
        }
        Ok(())
    }

    /// Make room for `additional` more rows in the fixed-width value buffers.
    ///
    /// Variable-width builders grow their byte buffers on their own.
    pub fn reserve(&mut self, additional: usize) {
        match self {
            Self::Int64(b) => b.reserve(additional),
            Self::Float64(b) => b.reserve(additional),
            Self::Null(_) | Self::Utf8(_) | Self::Binary(_) => {}
        }
    }

    /// Convert the pending values to `target` without losing any of them.
    ///
    /// An all-null column takes any type and integers become floats.
    /// Returns `false` for every other conversion.
    pub fn widen_to(&mut self, target: &DataType) -> bool {
        let widened = match (&*self, target) {
            (Self::Null(b), _) => {
                let pending = b.len();
                let Ok(mut column) = Self::with_capacity(target, pending) else {
                    return false;
                };
                for _ in 0..pending {
                    column.append_null();
                }
                column
            }
            (Self::Int64(b), DataType::Float64) => {
                let ints = b.finish_cloned();
                let mut floats = Float64Builder::with_capacity(ints.len());
                floats.extend(ints.iter().map(|v| v.map(|i| i as f64)));
                Self::Float64(floats)
            }
            _ => return false,
        };
        *self = widened;
        true
    }

    /// Build the array and reset the builder.
    pub fn finish(&mut self) -> ArrayRef {
        self.inner_mut().finish()
    }

    /// Build the array and keep the builder's contents.
    pub fn finish_cloned(&self) -> ArrayRef {
        self.inner().finish_cloned()
    }
}

/// Accumulates cursor rows into Arrow record batches of at most
/// `batch_size` rows.
///
/// Until the first batch is sealed a column may widen: a column that has
/// only seen nulls takes the type of its first non-null value, and an
/// integer column becomes `Float64` on its first real. Once a batch has
/// been produced the schema is fixed and any further conflict is a
/// `SchemaMismatch`.
#[derive(Debug)]
pub struct BatchBuilder {
    schema: SchemaRef,
    columns: Vec<ColumnBuilder>,
    batch_size: usize,
    rows: usize,
    sealed: bool,
}

impl BatchBuilder {
    pub fn new(schema: SchemaRef, batch_size: usize) -> Result<Self> {
        let batch_size = batch_size.max(1);
        let columns = fresh_columns(&schema, batch_size.min(INITIAL_ROW_CAPACITY))?;
        Ok(Self {
            schema,
            columns,
            batch_size,
            rows: 0,
            sealed: false,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn is_full(&self) -> bool {
        self.rows >= self.batch_size
    }

    /// Copy the cursor's current row into the pending batch.
    ///
    /// A value whose type does not fit its column, and cannot widen it,
    /// fails with `SchemaMismatch`.
    pub fn push_row<C: RowCursor + ?Sized>(&mut self, cursor: &C) -> Result<()> {
        for index in 0..self.columns.len() {
            let value = cursor.value_at(index)?;
            if let Err(found) = self.columns[index].append_value(value) {
                if !self.widen(index, &found) {
                    return Err(self.mismatch(index, &found));
                }
                self.columns[index]
                    .append_value(value)
                    .map_err(|found| self.mismatch(index, &found))?;
            }
        }
        self.rows += 1;
        Ok(())
    }

    fn widen(&mut self, index: usize, found: &DataType) -> bool {
        if self.sealed {
            return false;
        }
        let target = match (self.columns[index].data_type(), found) {
            (DataType::Null, _) => found.clone(),
            (DataType::Int64, DataType::Float64) => DataType::Float64,
            _ => return false,
        };
        if !self.columns[index].widen_to(&target) {
            return false;
        }

        let mut fields: Vec<FieldRef> = self.schema.fields().iter().cloned().collect();
        log::debug!(
            "column '{}' widened from {} to {target}",
            fields[index].name(),
            fields[index].data_type()
        );
        fields[index] = Arc::new(fields[index].as_ref().clone().with_data_type(target));
        self.schema = Arc::new(Schema::new_with_metadata(
            fields,
            self.schema.metadata().clone(),
        ));
        true
    }

    fn mismatch(&self, index: usize, found: &DataType) -> Error {
        Error::schema_mismatch(format!(
            "column '{}' was resolved as {} but pending row {} holds a {} value",
            column_name(&self.schema, index),
            self.columns[index].data_type(),
            self.rows,
            found
        ))
    }

    /// Seal the pending rows into a batch and start a new one.
    pub fn finish(&mut self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self.columns.iter_mut().map(ColumnBuilder::finish).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows));
        self.rows = 0;
        self.sealed = true;
        RecordBatch::try_new_with_options(self.schema.clone(), arrays, &options)
            .map_err(|e| Error::schema_mismatch(e.to_string()))
    }
}

fn fresh_columns(schema: &SchemaRef, rows: usize) -> Result<Vec<ColumnBuilder>> {
    schema
        .fields()
        .iter()
        .map(|field| ColumnBuilder::with_capacity(field.data_type(), rows))
        .collect()
}
