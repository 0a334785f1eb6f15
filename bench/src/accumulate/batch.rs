//! Batch accumulators.
//!
//! [`concatenate`] copies every batch into one growable set of Arrow column
//! builders. [`collect_batches`] keeps the record batches as they arrived
//! and only takes ownership of them, copying no values.
//!
//! Both read the stream's schema after pulling the first batch: a stream
//! exported from rows may widen its columns until that batch is sealed.

use arrow_array::RecordBatchOptions;
use rb_core::stream::BatchStream;
use rb_core::types::{
    column_name, describe, same_schema, ColumnBuilder, RecordBatch, SchemaRef,
    INITIAL_ROW_CAPACITY,
};
use rb_core::{Error, Result};

fn foreign_schema(index: usize, found: &SchemaRef, expected: &SchemaRef) -> Error {
    Error::schema_mismatch(format!(
        "batch {index} has schema {}, expected {}",
        describe(found),
        describe(expected)
    ))
}

/// One growable, schema-bound columnar buffer holding a whole result.
///
/// The schema is fixed at creation; every appended batch must carry an equal
/// schema. Row capacity at least doubles whenever it runs out.
#[derive(Debug)]
pub struct ConcatenatedBuffer {
    schema: SchemaRef,
    columns: Vec<ColumnBuilder>,
    row_count: usize,
    capacity: usize,
    reallocations: usize,
    batches_appended: usize,
}

impl ConcatenatedBuffer {
    /// An empty, zero-row buffer. No memory is reserved until the first append.
    pub fn new(schema: SchemaRef) -> Result<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnBuilder::with_capacity(f.data_type(), 0))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema,
            columns,
            row_count: 0,
            capacity: 0,
            reallocations: 0,
            batches_appended: 0,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Rows that fit before the next growth.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many times the row capacity has grown.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Snapshot of the buffered rows as one record batch.
    pub fn to_batch(&self) -> Result<RecordBatch> {
        let arrays = self.columns.iter().map(ColumnBuilder::finish_cloned).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.row_count));
        RecordBatch::try_new_with_options(self.schema.clone(), arrays, &options)
            .map_err(|e| Error::schema_mismatch(e.to_string()))
    }

    /// Copy all rows of `batch` onto the end of the buffer.
    ///
    /// Fails with `SchemaMismatch`, leaving the buffer untouched, if the
    /// batch's schema differs from the buffer's.
    pub fn append(&mut self, batch: &RecordBatch) -> Result<()> {
        if !same_schema(&self.schema, batch.schema_ref()) {
            return Err(foreign_schema(
                self.batches_appended,
                batch.schema_ref(),
                &self.schema,
            ));
        }

        self.ensure_capacity(self.row_count + batch.num_rows());
        for (index, (dst, src)) in self.columns.iter_mut().zip(batch.columns()).enumerate() {
            dst.append_array(src.as_ref()).map_err(|found| {
                Error::schema_mismatch(format!(
                    "column '{}' holds {} data, expected {}",
                    column_name(&self.schema, index),
                    found,
                    dst.data_type()
                ))
            })?;
        }

        self.row_count += batch.num_rows();
        self.batches_appended += 1;
        Ok(())
    }

    fn ensure_capacity(&mut self, required: usize) {
        if required <= self.capacity {
            return;
        }
        let new_capacity = required
            .max(self.capacity * 2)
            .max(INITIAL_ROW_CAPACITY);
        for column in &mut self.columns {
            column.reserve(new_capacity - self.row_count);
        }
        log::trace!(
            "concatenated buffer grows {} -> {} rows",
            self.capacity,
            new_capacity
        );
        self.capacity = new_capacity;
        self.reallocations += 1;
    }
}

/// Concatenate-in-place: drain `stream` into one [`ConcatenatedBuffer`].
///
/// Each batch is copied and then dropped. A stream without batches yields a
/// zero-row buffer carrying the stream's schema.
pub fn concatenate<S: BatchStream + ?Sized>(stream: &mut S) -> Result<ConcatenatedBuffer> {
    let mut next = stream.next_batch()?;
    let mut buffer = ConcatenatedBuffer::new(stream.schema().clone())?;
    while let Some(batch) = next {
        buffer.append(&batch)?;
        next = stream.next_batch()?;
    }
    log::debug!(
        "concatenated {} batches into {} rows ({} growths)",
        buffer.batches_appended,
        buffer.row_count,
        buffer.reallocations
    );
    Ok(buffer)
}

/// Batches retained in arrival order, boundaries preserved.
#[derive(Debug)]
pub struct BatchList {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl BatchList {
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Take ownership of `batch`, checking it against the list's schema.
    pub fn push(&mut self, batch: RecordBatch) -> Result<()> {
        if !same_schema(&self.schema, batch.schema_ref()) {
            return Err(foreign_schema(
                self.batches.len(),
                batch.schema_ref(),
                &self.schema,
            ));
        }
        self.batches.push(batch);
        Ok(())
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total rows, summed over the retained batches.
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Batch-list collection: move every batch of `stream` into a [`BatchList`].
pub fn collect_batches<S: BatchStream + ?Sized>(stream: &mut S) -> Result<BatchList> {
    let mut next = stream.next_batch()?;
    let mut list = BatchList::new(stream.schema().clone());
    while let Some(batch) = next {
        list.push(batch)?;
        next = stream.next_batch()?;
    }
    log::debug!("collected {} batches", list.len());
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;
    use arrow_array::{ArrayRef, BinaryArray, Int64Array, StringArray};
    use rb_core::stream::MemoryBatchStream;
    use rb_core::types::{DataType, Field, Schema};
    use rb_core::ErrorCategory;
    use std::sync::Arc;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("l_orderkey", DataType::Int64, true),
            Field::new("l_shipmode", DataType::Utf8, true),
        ]))
    }

    fn batch(schema: &SchemaRef, start: i64, rows: i64) -> RecordBatch {
        let keys = Int64Array::from_iter_values(start..start + rows);
        let modes = StringArray::from_iter_values(
            (start..start + rows).map(|i| if i % 2 == 0 { "AIR" } else { "RAIL" }),
        );
        let columns: Vec<ArrayRef> = vec![Arc::new(keys), Arc::new(modes)];
        RecordBatch::try_new(schema.clone(), columns).unwrap()
    }

    #[test]
    fn concatenate_preserves_values_across_batches() {
        let s = schema();
        let mut stream =
            MemoryBatchStream::new(s.clone(), vec![batch(&s, 0, 3), batch(&s, 3, 2)]);
        let buffer = concatenate(&mut stream).unwrap();
        assert_eq!(buffer.row_count(), 5);

        let all = buffer.to_batch().unwrap();
        let keys: Vec<i64> = all.column(0).as_primitive::<Int64Type>().values().to_vec();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
        let modes = all.column(1).as_string::<i32>();
        assert_eq!(modes.value(3), "RAIL");
        assert_eq!(modes.value(4), "AIR");
    }

    #[test]
    fn concatenate_empty_stream_keeps_schema() {
        let s = schema();
        let mut stream = MemoryBatchStream::new(s.clone(), Vec::new());
        let buffer = concatenate(&mut stream).unwrap();
        assert_eq!(buffer.row_count(), 0);
        assert_eq!(buffer.schema(), &s);
        assert_eq!(buffer.to_batch().unwrap().num_columns(), 2);
        assert_eq!(buffer.reallocations(), 0);
    }

    #[test]
    fn growth_doubles_capacity() {
        let s = schema();
        let mut buffer = ConcatenatedBuffer::new(s.clone()).unwrap();
        buffer.append(&batch(&s, 0, 10)).unwrap();
        assert_eq!(buffer.capacity(), INITIAL_ROW_CAPACITY);

        buffer.append(&batch(&s, 10, INITIAL_ROW_CAPACITY as i64)).unwrap();
        assert_eq!(buffer.capacity(), INITIAL_ROW_CAPACITY * 2);
        assert_eq!(buffer.reallocations(), 2);

        // A batch bigger than double the capacity grows straight to its size.
        let big = INITIAL_ROW_CAPACITY as i64 * 8;
        buffer.append(&batch(&s, 0, big)).unwrap();
        assert_eq!(buffer.capacity(), buffer.row_count());
        assert_eq!(buffer.reallocations(), 3);
    }

    #[test]
    fn append_rejects_foreign_schema_and_keeps_state() {
        let s = schema();
        let other = Arc::new(Schema::new(vec![
            Field::new("l_orderkey", DataType::Int64, true),
            Field::new("l_shipmode", DataType::Binary, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![9])),
            Arc::new(BinaryArray::from(vec![b"AIR".as_slice()])),
        ];
        let foreign = RecordBatch::try_new(other, columns).unwrap();

        let mut buffer = ConcatenatedBuffer::new(s.clone()).unwrap();
        buffer.append(&batch(&s, 0, 4)).unwrap();
        let err = buffer.append(&foreign).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Schema);
        assert!(err.to_string().contains("batch 1"));
        assert!(err.to_string().contains("l_shipmode: Binary"));
        assert_eq!(buffer.row_count(), 4);
    }

    #[test]
    fn collect_batches_keeps_boundaries_and_order() {
        let s = schema();
        let mut stream = MemoryBatchStream::new(
            s.clone(),
            vec![batch(&s, 0, 3), batch(&s, 3, 1), batch(&s, 4, 2)],
        );
        let list = collect_batches(&mut stream).unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(list.row_count(), 6);
        let firsts: Vec<i64> = list
            .batches()
            .iter()
            .map(|b| b.column(0).as_primitive::<Int64Type>().value(0))
            .collect();
        assert_eq!(firsts, vec![0, 3, 4]);
    }

    #[test]
    fn collect_batches_of_empty_stream() {
        let s = schema();
        let mut stream = MemoryBatchStream::new(s.clone(), Vec::new());
        let list = collect_batches(&mut stream).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.row_count(), 0);
        assert_eq!(list.schema(), &s);
    }
}
