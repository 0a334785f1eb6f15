//! Row accumulators.
//!
//! Both copy every value out of the cursor before advancing it, so the
//! result never borrows from the statement or connection that produced it.

use rb_core::stream::RowCursor;
use rb_core::types::{SchemaRef, Value, ValueRef};
use rb_core::{Error, Result};

/// One row of owned values, ordered as the schema's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RowTuple(Box<[Value]>);

impl RowTuple {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for RowTuple {
    fn from(values: Vec<Value>) -> Self {
        Self(values.into_boxed_slice())
    }
}

/// Rows collected into an ordered list, one tuple per row.
#[derive(Debug)]
pub struct RowList {
    schema: SchemaRef,
    rows: Vec<RowTuple>,
}

impl RowList {
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn rows(&self) -> &[RowTuple] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn read_row<C: RowCursor + ?Sized>(cursor: &C, width: usize, out: &mut Vec<Value>) -> Result<()> {
    for column in 0..width {
        out.push(cursor.value_at(column)?.to_owned());
    }
    Ok(())
}

/// Row-list collection: copy every row of `cursor` into its own tuple.
pub fn collect_rows<C: RowCursor + ?Sized>(cursor: &mut C) -> Result<RowList> {
    let schema = cursor.schema().clone();
    let width = cursor.column_count();
    let mut rows = Vec::new();
    while cursor.advance()? {
        let mut values = Vec::with_capacity(width);
        read_row(&*cursor, width, &mut values)?;
        rows.push(RowTuple::from(values));
    }
    log::debug!("collected {} rows of {} columns", rows.len(), width);
    Ok(RowList { schema, rows })
}

/// A fully materialized row set, navigable after its source is closed.
///
/// Values are stored row-major in one flat vector.
#[derive(Debug)]
pub struct DisconnectedRowSet {
    schema: SchemaRef,
    values: Vec<Value>,
    width: usize,
    rows: usize,
}

impl DisconnectedRowSet {
    /// Drain `cursor` into a new row set.
    pub fn populate<C: RowCursor + ?Sized>(cursor: &mut C) -> Result<Self> {
        let schema = cursor.schema().clone();
        let width = cursor.column_count();
        let mut values = Vec::new();
        let mut rows = 0;
        while cursor.advance()? {
            read_row(&*cursor, width, &mut values)?;
            rows += 1;
        }
        log::debug!("populated row set with {rows} rows of {width} columns");
        Ok(Self {
            schema,
            values,
            width,
            rows,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Stored row count, known without iterating.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.width;
        self.values.get(start..start + self.width)
    }

    /// Rows in stored order.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> + '_ {
        (0..self.rows).filter_map(move |i| self.row(i))
    }

    /// A fresh cursor positioned before the first row.
    pub fn cursor(&self) -> RowSetCursor<'_> {
        RowSetCursor {
            set: self,
            position: None,
        }
    }

    /// Count rows by walking a cursor to the end, as a client of the
    /// disconnected set would.
    pub fn count_rows(&self) -> Result<usize> {
        let mut cursor = self.cursor();
        let mut count = 0;
        while cursor.advance()? {
            count += 1;
        }
        Ok(count)
    }
}

/// Cursor over a [`DisconnectedRowSet`]. Touches no connection.
#[derive(Debug)]
pub struct RowSetCursor<'a> {
    set: &'a DisconnectedRowSet,
    position: Option<usize>,
}

impl RowCursor for RowSetCursor<'_> {
    fn schema(&self) -> &SchemaRef {
        &self.set.schema
    }

    fn advance(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1).min(self.set.rows);
        self.position = Some(next);
        Ok(next < self.set.rows)
    }

    fn value_at(&self, column: usize) -> Result<ValueRef<'_>> {
        let row = self
            .position
            .and_then(|p| self.set.row(p))
            .ok_or_else(|| Error::query("row set cursor is not positioned on a row"))?;
        row.get(column).map(Value::as_ref).ok_or_else(|| {
            Error::query(format!(
                "column {column} out of range for {} columns",
                self.set.width
            ))
        })
    }
}
