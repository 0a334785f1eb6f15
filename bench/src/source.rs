//! SQLite source connector.
//!
//! The data engine is reached only through open, prepare/execute, the two
//! iteration protocols and close. SQLite has no columnar wire format, so the
//! columnar transport is the driver-side export of the row cursor into
//! batches of `batch_size` rows.
//!
//! Release order is always cursor, then statement, then connection. The
//! cursor borrows the statement and the statement borrows the connection, so
//! the compiler rejects any other order.

use crate::populate;
use fallible_streaming_iterator::FallibleStreamingIterator;
use rb_core::stream::{CursorBatchStream, ResultStream, RowCursor, Transport};
use rb_core::types::{declared_type, describe, DataType, Field, Schema, SchemaRef, ValueRef};
use rb_core::{Error, Result};
use rusqlite::{types::ValueRef as SqlValueRef, Connection, OpenFlags, Rows, Statement};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_BATCH_SIZE: usize = 2048;
pub const DEFAULT_EXPORT_BATCH_SIZE: usize = 65_536;
pub const DEFAULT_SYNTHETIC_ROWS: usize = 100_000;
/// Upper bound for either batch size setting.
pub const MAX_BATCH_SIZE: usize = 1 << 20;

/// Where the data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// An existing database file, opened read-only.
    File(PathBuf),
    /// A private in-memory database filled with synthetic `lineitem` rows.
    InMemory,
}

impl SourceLocation {
    /// `:memory:` selects the in-memory source, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        if value == ":memory:" {
            Self::InMemory
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InMemory => write!(f, ":memory:"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub location: SourceLocation,
    /// Rows per batch on the columnar transport.
    pub batch_size: usize,
    /// Rows per batch when a row cursor is exported as batches.
    pub export_batch_size: usize,
    /// Rows generated for [`SourceLocation::InMemory`].
    pub synthetic_rows: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: SourceLocation::File(PathBuf::from("tpch_lineitem.sqlite")),
            batch_size: DEFAULT_BATCH_SIZE,
            export_batch_size: DEFAULT_EXPORT_BATCH_SIZE,
            synthetic_rows: DEFAULT_SYNTHETIC_ROWS,
        }
    }
}

/// An open connection to the data source.
pub struct SourceConnection {
    conn: Connection,
    location: SourceLocation,
    batch_size: usize,
}

impl SourceConnection {
    /// Open the configured source.
    ///
    /// Files must already exist and are opened read-only. The schema catalog
    /// is read once so that a file which is not a database fails here with a
    /// connection error rather than later as a query error.
    pub fn open(config: &SourceConfig) -> Result<Self> {
        let conn = match &config.location {
            SourceLocation::File(path) => {
                let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
                let conn = Connection::open_with_flags(path, flags).map_err(|e| {
                    Error::connection_with_source(format!("cannot open {}", path.display()), e)
                })?;
                conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| {
                    r.get::<_, i64>(0)
                })
                .map_err(|e| {
                    Error::connection_with_source(
                        format!("{} is not a readable database", path.display()),
                        e,
                    )
                })?;
                conn
            }
            SourceLocation::InMemory => {
                let conn = Connection::open_in_memory().map_err(|e| {
                    Error::connection_with_source("cannot open in-memory database", e)
                })?;
                populate::populate_lineitem(&conn, config.synthetic_rows, populate::DEFAULT_SEED)
                    .map_err(|e| {
                        Error::connection(format!("cannot populate in-memory source: {e:#}"))
                    })?;
                conn
            }
        };

        log::info!("opened source {}", config.location);
        Ok(Self {
            conn,
            location: config.location.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    /// Wrap a connection that is already open and populated.
    pub fn from_connection(conn: Connection, batch_size: usize) -> Self {
        Self {
            conn,
            location: SourceLocation::InMemory,
            batch_size: batch_size.max(1),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Compile `sql`. First half of `executeQuery`; the second half is
    /// [`QueryStatement::execute`], which picks the transport.
    pub fn prepare(&self, sql: &str) -> Result<QueryStatement<'_>> {
        let stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::query_with_sql("cannot prepare query", sql, e))?;
        log::debug!("prepared query: {sql}");
        Ok(QueryStatement {
            stmt,
            sql: sql.to_owned(),
            batch_size: self.batch_size,
        })
    }

    /// Prepare and execute `sql` on `transport` and hand the result to
    /// `consume`. The statement is finalized once `consume` returns; a
    /// finalize failure after a successful `consume` is logged and does not
    /// replace its output.
    pub fn execute_query<R>(
        &self,
        sql: &str,
        transport: Transport,
        consume: impl FnOnce(ResultStream<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut statement = self.prepare(sql)?;
        let output = consume(statement.execute(transport)?)?;
        if let Err(e) = statement.finalize() {
            log::warn!("{e}");
        }
        Ok(output)
    }

    /// Close the connection, reporting failures instead of swallowing them
    /// as `Drop` would.
    pub fn close(self) -> Result<()> {
        let location = self.location;
        self.conn
            .close()
            .map_err(|(_conn, e)| Error::release("connection", e))?;
        log::debug!("closed source {location}");
        Ok(())
    }
}

/// A compiled query, ready to be executed on either transport.
pub struct QueryStatement<'c> {
    stmt: Statement<'c>,
    sql: String,
    batch_size: usize,
}

impl QueryStatement<'_> {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Run the query and hand out its result on `transport`.
    pub fn execute(&mut self, transport: Transport) -> Result<ResultStream<'_>> {
        let cursor = SqliteRowCursor::open(&mut self.stmt, &self.sql)?;
        log::debug!(
            "executing on {transport} transport, schema {}",
            describe(cursor.schema())
        );
        Ok(match transport {
            Transport::Columnar => {
                ResultStream::Columnar(Box::new(CursorBatchStream::new(cursor, self.batch_size)?))
            }
            Transport::RowCursor => ResultStream::RowCursor(Box::new(cursor)),
        })
    }

    /// Release the statement, reporting failures.
    pub fn finalize(self) -> Result<()> {
        self.stmt
            .finalize()
            .map_err(|e| Error::release("statement", e))
    }
}

/// Row cursor over a running SQLite statement.
///
/// The first row is fetched when the cursor opens so that columns without a
/// declared type can take the type of their first value. That row is still
/// the one the first [`RowCursor::advance`] lands on. The columnar export
/// may widen such a column further while it fills its first batch.
pub struct SqliteRowCursor<'s> {
    rows: Rows<'s>,
    schema: SchemaRef,
    primed: bool,
}

impl<'s> SqliteRowCursor<'s> {
    fn open(stmt: &'s mut Statement<'_>, sql: &str) -> Result<Self> {
        let declared: Vec<(String, Option<DataType>)> = stmt
            .columns()
            .iter()
            .map(|c| {
                let data_type = c.decl_type().and_then(declared_type);
                (c.name().to_owned(), data_type)
            })
            .collect();

        let mut rows = stmt
            .query([])
            .map_err(|e| Error::query_with_sql("cannot execute query", sql, e))?;
        rows.advance()
            .map_err(|e| Error::query_with_sql("cannot fetch first row", sql, e))?;

        let first = FallibleStreamingIterator::get(&rows);
        let mut fields = Vec::with_capacity(declared.len());
        for (index, (name, data_type)) in declared.into_iter().enumerate() {
            let data_type = match (data_type, first) {
                (Some(declared), _) => declared,
                (None, Some(row)) => {
                    let value = row
                        .get_ref(index)
                        .map_err(|e| Error::query_with_source("cannot read first row", e))?;
                    sql_type(value)
                }
                (None, None) => DataType::Null,
            };
            fields.push(Field::new(name, data_type, true));
        }

        Ok(Self {
            rows,
            schema: Arc::new(Schema::new(fields)),
            primed: true,
        })
    }
}

impl RowCursor for SqliteRowCursor<'_> {
    fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn advance(&mut self) -> Result<bool> {
        if self.primed {
            self.primed = false;
        } else {
            self.rows
                .advance()
                .map_err(|e| Error::query_with_source("cannot fetch next row", e))?;
        }
        Ok(FallibleStreamingIterator::get(&self.rows).is_some())
    }

    fn value_at(&self, column: usize) -> Result<ValueRef<'_>> {
        let row = FallibleStreamingIterator::get(&self.rows)
            .ok_or_else(|| Error::query("cursor is not positioned on a row"))?;
        let value = row.get_ref(column).map_err(|e| {
            Error::query_with_source(format!("cannot read column {column}"), e)
        })?;
        Ok(match value {
            SqlValueRef::Null => ValueRef::Null,
            SqlValueRef::Integer(v) => ValueRef::Integer(v),
            SqlValueRef::Real(v) => ValueRef::Real(v),
            SqlValueRef::Text(bytes) => ValueRef::Text(std::str::from_utf8(bytes).map_err(|e| {
                Error::query_with_source(format!("column {column} holds invalid UTF-8"), e)
            })?),
            SqlValueRef::Blob(bytes) => ValueRef::Blob(bytes),
        })
    }
}

fn sql_type(value: SqlValueRef<'_>) -> DataType {
    match value {
        SqlValueRef::Null => DataType::Null,
        SqlValueRef::Integer(_) => DataType::Int64,
        SqlValueRef::Real(_) => DataType::Float64,
        SqlValueRef::Text(_) => DataType::Utf8,
        SqlValueRef::Blob(_) => DataType::Binary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_core::stream::BatchStream;
    use rb_core::ErrorCategory;

    fn source_with(sql: &str) -> SourceConnection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(sql).unwrap();
        SourceConnection::from_connection(conn, 2)
    }

    fn column_types(schema: &SchemaRef) -> Vec<DataType> {
        schema.fields().iter().map(|f| f.data_type().clone()).collect()
    }

    fn cursor_of<'a, 's>(stream: &'a mut ResultStream<'s>) -> &'a mut (dyn RowCursor + 's) {
        match stream {
            ResultStream::RowCursor(cursor) => cursor.as_mut(),
            ResultStream::Columnar(_) => panic!("expected a row cursor"),
        }
    }

    #[test]
    fn location_parse_recognizes_memory() {
        assert_eq!(SourceLocation::parse(":memory:"), SourceLocation::InMemory);
        assert_eq!(
            SourceLocation::parse("data/lineitem.sqlite"),
            SourceLocation::File(PathBuf::from("data/lineitem.sqlite"))
        );
    }

    #[test]
    fn declared_types_resolve_without_rows() {
        let source = source_with("CREATE TABLE t (a INTEGER, b VARCHAR(10), c DOUBLE, d BLOB)");
        let mut stmt = source.prepare("SELECT * FROM t").unwrap();
        let stream = stmt.execute(Transport::RowCursor).unwrap();
        let types = column_types(stream.schema());
        assert_eq!(
            types,
            vec![DataType::Int64, DataType::Utf8, DataType::Float64, DataType::Binary]
        );
    }

    #[test]
    fn undeclared_columns_take_first_row_type() {
        let source = source_with("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1), (2);");
        let mut stmt = source
            .prepare("SELECT a, a * 0.5 AS half, 'x' || a AS label, NULL AS nothing FROM t")
            .unwrap();
        let stream = stmt.execute(Transport::RowCursor).unwrap();
        let types = column_types(stream.schema());
        assert_eq!(
            types,
            vec![DataType::Int64, DataType::Float64, DataType::Utf8, DataType::Null]
        );
    }

    #[test]
    fn numeric_affinity_columns_are_floats() {
        let source = source_with(
            "CREATE TABLE lineitem (l_discount DECIMAL(15,2), l_shipdate DATE);
             INSERT INTO lineitem VALUES (0.00, '1995-03-01'), (0.04, '1995-03-02');",
        );
        let mut stmt = source.prepare("SELECT * FROM lineitem").unwrap();
        let stream = stmt.execute(Transport::Columnar).unwrap();
        let types = column_types(stream.schema());
        assert_eq!(types, vec![DataType::Float64, DataType::Utf8]);

        let ResultStream::Columnar(mut batches) = stream else {
            panic!("expected a batch stream");
        };
        let mut rows = 0;
        while let Some(batch) = batches.next_batch().unwrap() {
            rows += batch.num_rows();
        }
        assert_eq!(rows, 2);
    }

    #[test]
    fn widening_stops_once_the_first_batch_is_sealed() {
        let source = source_with("CREATE TABLE t (v); INSERT INTO t VALUES (NULL), (3), (4.5);");
        let mut stmt = source.prepare("SELECT v FROM t ORDER BY rowid").unwrap();
        let stream = stmt.execute(Transport::Columnar).unwrap();
        assert_eq!(stream.schema().field(0).data_type(), &DataType::Null);
        let ResultStream::Columnar(mut batches) = stream else {
            panic!("expected a batch stream");
        };

        // batch size is 2: the real in the third row arrives after the schema is settled
        let first = batches.next_batch().unwrap().unwrap();
        assert_eq!(first.schema().field(0).data_type(), &DataType::Int64);
        let err = batches.next_batch().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Schema);
    }

    #[test]
    fn priming_does_not_skip_the_first_row() {
        let source = source_with("CREATE TABLE t (v); INSERT INTO t VALUES (10), (20), (30);");
        let mut stmt = source.prepare("SELECT v FROM t ORDER BY v").unwrap();
        let mut stream = stmt.execute(Transport::RowCursor).unwrap();
        let cursor = cursor_of(&mut stream);

        let mut seen = Vec::new();
        while cursor.advance().unwrap() {
            seen.push(cursor.value_at(0).unwrap().to_owned());
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], rb_core::types::Value::Integer(10));
        assert!(!cursor.advance().unwrap());
    }

    #[test]
    fn columnar_transport_batches_by_batch_size() {
        let source = source_with(
            "CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1), (2), (3), (4), (5);",
        );
        let mut stmt = source.prepare("SELECT v FROM t").unwrap();
        let stream = stmt.execute(Transport::Columnar).unwrap();
        let ResultStream::Columnar(mut batches) = stream else {
            panic!("expected a batch stream");
        };

        let mut sizes = Vec::new();
        while let Some(batch) = batches.next_batch().unwrap() {
            sizes.push(batch.num_rows());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn execute_query_finalizes_after_consuming() {
        let source = source_with("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1), (2);");
        let rows = source
            .execute_query("SELECT v FROM t", Transport::RowCursor, |mut stream| {
                let cursor = cursor_of(&mut stream);
                let mut n = 0;
                while cursor.advance()? {
                    n += 1;
                }
                Ok(n)
            })
            .unwrap();
        assert_eq!(rows, 2);
        source.close().unwrap();
    }

    #[test]
    fn malformed_query_is_a_query_error() {
        let source = source_with("CREATE TABLE t (v INTEGER)");
        let err = source.prepare("SELECT * FORM t").err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Query);
        assert_eq!(err.sql(), Some("SELECT * FORM t"));
    }

    #[test]
    fn missing_file_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig {
            location: SourceLocation::File(dir.path().join("absent.sqlite")),
            ..SourceConfig::default()
        };
        let err = SourceConnection::open(&config).err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[test]
    fn in_memory_source_is_populated_and_closes() {
        let config = SourceConfig {
            location: SourceLocation::InMemory,
            synthetic_rows: 42,
            ..SourceConfig::default()
        };
        let source = SourceConnection::open(&config).unwrap();
        let mut stmt = source.prepare("SELECT * FROM lineitem").unwrap();
        let mut stream = stmt.execute(Transport::RowCursor).unwrap();
        let cursor = cursor_of(&mut stream);
        assert_eq!(cursor.column_count(), populate::LINEITEM_COLUMNS);

        let mut n = 0;
        while cursor.advance().unwrap() {
            n += 1;
        }
        assert_eq!(n, 42);

        drop(stream);
        stmt.finalize().unwrap();
        source.close().unwrap();
    }
}
