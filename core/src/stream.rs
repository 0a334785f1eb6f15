//! Transport variants for consuming a query result.
//!
//! A result arrives either as a [`BatchStream`] of columnar batches or as a
//! [`RowCursor`] over individual rows. Both are pull-based, single-consumer
//! and finite; neither can be restarted. [`ResultStream`] is the tagged union
//! handed out once a query has been executed on a chosen [`Transport`].

use crate::error::{Error, Result};
use crate::types::{BatchBuilder, RecordBatch, SchemaRef, Value, ValueRef};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Protocol used to retrieve a result.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    Columnar,
    RowCursor,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Columnar => write!(f, "columnar"),
            Self::RowCursor => write!(f, "row-cursor"),
        }
    }
}

/// Pull-based sequence of batches.
pub trait BatchStream {
    /// Schema of every batch this stream yields, known even when it yields none.
    ///
    /// A stream built from rows may still widen column types while it fills
    /// its first batch; read the schema again after that batch to get the
    /// one every batch carries.
    fn schema(&self) -> &SchemaRef;

    /// Next batch, or `None` once the stream is exhausted.
    fn next_batch(&mut self) -> Result<Option<RecordBatch>>;
}

/// Pull-based cursor over rows.
///
/// Values borrowed through [`RowCursor::value_at`] are only valid until the
/// next [`RowCursor::advance`]; the borrow checker enforces this.
pub trait RowCursor {
    fn schema(&self) -> &SchemaRef;

    /// Move to the next row. Returns `false` once the rows are exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Value of `column` in the current row.
    fn value_at(&self, column: usize) -> Result<ValueRef<'_>>;

    fn column_count(&self) -> usize {
        self.schema().fields().len()
    }
}

impl<T: BatchStream + ?Sized> BatchStream for Box<T> {
    fn schema(&self) -> &SchemaRef {
        (**self).schema()
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        (**self).next_batch()
    }
}

impl<T: RowCursor + ?Sized> RowCursor for Box<T> {
    fn schema(&self) -> &SchemaRef {
        (**self).schema()
    }

    fn advance(&mut self) -> Result<bool> {
        (**self).advance()
    }

    fn value_at(&self, column: usize) -> Result<ValueRef<'_>> {
        (**self).value_at(column)
    }
}

/// An executed query, on the transport it was executed with.
pub enum ResultStream<'s> {
    Columnar(Box<dyn BatchStream + 's>),
    RowCursor(Box<dyn RowCursor + 's>),
}

impl ResultStream<'_> {
    pub fn transport(&self) -> Transport {
        match self {
            Self::Columnar(_) => Transport::Columnar,
            Self::RowCursor(_) => Transport::RowCursor,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        match self {
            Self::Columnar(stream) => stream.schema(),
            Self::RowCursor(cursor) => cursor.schema(),
        }
    }
}

impl fmt::Debug for ResultStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("transport", &self.transport())
            .field("schema", self.schema())
            .finish()
    }
}

/// Exports a row cursor as a stream of batches of `batch_size` rows.
///
/// The last batch may be shorter; an exhausted cursor yields no empty batch.
pub struct CursorBatchStream<C> {
    cursor: C,
    builder: BatchBuilder,
    exhausted: bool,
}

impl<C: RowCursor> CursorBatchStream<C> {
    pub fn new(cursor: C, batch_size: usize) -> Result<Self> {
        let builder = BatchBuilder::new(cursor.schema().clone(), batch_size)?;
        Ok(Self {
            cursor,
            builder,
            exhausted: false,
        })
    }
}

impl<C: RowCursor> BatchStream for CursorBatchStream<C> {
    fn schema(&self) -> &SchemaRef {
        self.builder.schema()
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        while !self.exhausted && !self.builder.is_full() {
            if self.cursor.advance()? {
                self.builder.push_row(&self.cursor)?;
            } else {
                self.exhausted = true;
            }
        }
        if self.builder.is_empty() {
            return Ok(None);
        }
        self.builder.finish().map(Some)
    }
}

/// Batch stream over batches that are already in memory.
#[derive(Debug)]
pub struct MemoryBatchStream {
    schema: SchemaRef,
    batches: VecDeque<RecordBatch>,
}

impl MemoryBatchStream {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self {
            schema,
            batches: batches.into(),
        }
    }
}

impl BatchStream for MemoryBatchStream {
    fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        Ok(self.batches.pop_front())
    }
}

/// Row cursor over rows that are already in memory.
#[derive(Debug)]
pub struct MemoryRowCursor {
    schema: SchemaRef,
    rows: Vec<Vec<Value>>,
    position: Option<usize>,
}

impl MemoryRowCursor {
    pub fn new(schema: SchemaRef, rows: Vec<Vec<Value>>) -> Self {
        Self {
            schema,
            rows,
            position: None,
        }
    }
}

impl RowCursor for MemoryRowCursor {
    fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn advance(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1).min(self.rows.len());
        self.position = Some(next);
        Ok(next < self.rows.len())
    }

    fn value_at(&self, column: usize) -> Result<ValueRef<'_>> {
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| Error::query("cursor is not positioned on a row"))?;
        row.get(column).map(Value::as_ref).ok_or_else(|| {
            Error::query(format!(
                "column {column} out of range for {} columns",
                row.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Field, Schema};
    use std::sync::Arc;

    fn id_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]))
    }

    fn id_rows(n: i64) -> Vec<Vec<Value>> {
        (0..n).map(|i| vec![Value::Integer(i)]).collect()
    }

    #[test]
    fn memory_cursor_stops_and_stays_stopped() {
        let mut cursor = MemoryRowCursor::new(id_schema(), id_rows(2));
        assert!(cursor.value_at(0).is_err());
        assert!(cursor.advance().unwrap());
        assert_eq!(cursor.value_at(0).unwrap(), ValueRef::Integer(0));
        assert!(cursor.advance().unwrap());
        assert!(!cursor.advance().unwrap());
        assert!(!cursor.advance().unwrap());
        assert!(cursor.value_at(0).is_err());
    }

    #[test]
    fn export_splits_rows_into_batches() {
        let cursor = MemoryRowCursor::new(id_schema(), id_rows(5));
        let mut stream = CursorBatchStream::new(cursor, 2).unwrap();

        let sizes: Vec<usize> = std::iter::from_fn(|| stream.next_batch().unwrap())
            .map(|b| b.num_rows())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(stream.next_batch().unwrap().is_none());
    }

    #[test]
    fn export_of_empty_cursor_yields_nothing_but_keeps_schema() {
        let cursor = MemoryRowCursor::new(id_schema(), Vec::new());
        let mut stream = CursorBatchStream::new(cursor, 16).unwrap();
        assert!(stream.next_batch().unwrap().is_none());
        assert_eq!(stream.schema().fields().len(), 1);
    }

    #[test]
    fn export_shares_one_schema_across_batches() {
        let cursor = MemoryRowCursor::new(id_schema(), id_rows(4));
        let mut stream = CursorBatchStream::new(cursor, 2).unwrap();
        let a = stream.next_batch().unwrap().unwrap();
        let b = stream.next_batch().unwrap().unwrap();
        assert!(Arc::ptr_eq(a.schema_ref(), b.schema_ref()));
    }

    #[test]
    fn export_settles_widened_schema_with_first_batch() {
        let schema = Arc::new(Schema::new(vec![Field::new("l_discount", DataType::Int64, true)]));
        let rows = vec![vec![Value::Integer(0)], vec![Value::Real(0.04)], vec![Value::Null]];
        let mut stream = CursorBatchStream::new(MemoryRowCursor::new(schema, rows), 2).unwrap();

        let first = stream.next_batch().unwrap().unwrap();
        assert_eq!(first.schema().field(0).data_type(), &DataType::Float64);
        assert!(Arc::ptr_eq(first.schema_ref(), stream.schema()));

        let second = stream.next_batch().unwrap().unwrap();
        assert_eq!(second.num_rows(), 1);
        assert!(Arc::ptr_eq(first.schema_ref(), second.schema_ref()));
    }

    #[test]
    fn result_stream_reports_transport() {
        let stream = ResultStream::Columnar(Box::new(MemoryBatchStream::new(id_schema(), vec![])));
        assert_eq!(stream.transport(), Transport::Columnar);
        let cursor = ResultStream::RowCursor(Box::new(MemoryRowCursor::new(id_schema(), vec![])));
        assert_eq!(cursor.transport(), Transport::RowCursor);
        assert_eq!(Transport::RowCursor.to_string(), "row-cursor");
    }
}
