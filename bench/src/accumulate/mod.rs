//! Accumulation strategies that turn a streamed result into one in-memory
//! structure.
//!
//! - [`batch`]: concatenate-in-place and batch-list collection
//! - [`row`]: row-list collection and disconnected row-set materialization

pub mod batch;
pub mod row;

pub use batch::{collect_batches, concatenate, BatchList, ConcatenatedBuffer};
pub use row::{collect_rows, DisconnectedRowSet, RowList, RowSetCursor, RowTuple};
