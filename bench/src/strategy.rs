//! The five (transport, representation) pairs a run can measure.

use crate::accumulate::{
    collect_batches, collect_rows, concatenate, BatchList, ConcatenatedBuffer,
    DisconnectedRowSet, RowList,
};
use rb_core::stream::{CursorBatchStream, ResultStream, Transport};
use rb_core::{Error, Result};
use serde::Serialize;
use std::fmt;

/// In-memory structure a result is accumulated into.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Representation {
    ConcatenatedBuffer,
    BatchList,
    RowList,
    DisconnectedRowSet,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConcatenatedBuffer => write!(f, "concatenated-buffer"),
            Self::BatchList => write!(f, "batch-list"),
            Self::RowList => write!(f, "row-list"),
            Self::DisconnectedRowSet => write!(f, "disconnected-row-set"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Columnar transport, batches copied into one buffer.
    ConcatenatedBuffer,
    /// Columnar transport, batches kept as they arrived.
    BatchList,
    /// Row transport exported as batches of `batch_size` rows, copied into
    /// one buffer.
    ExportedBuffer { batch_size: usize },
    RowList,
    DisconnectedRowSet,
}

impl Strategy {
    /// Map a (transport, representation) pair to its strategy.
    ///
    /// `export_batch_size` is only used by the row transport's concatenated
    /// buffer. Pairs with no strategy are configuration errors.
    pub fn from_pair(
        transport: Transport,
        representation: Representation,
        export_batch_size: usize,
    ) -> Result<Self> {
        match (transport, representation) {
            (Transport::Columnar, Representation::ConcatenatedBuffer) => {
                Ok(Self::ConcatenatedBuffer)
            }
            (Transport::Columnar, Representation::BatchList) => Ok(Self::BatchList),
            (Transport::RowCursor, Representation::ConcatenatedBuffer) => {
                if export_batch_size == 0 {
                    return Err(Error::config("export batch size must be positive"));
                }
                Ok(Self::ExportedBuffer {
                    batch_size: export_batch_size,
                })
            }
            (Transport::RowCursor, Representation::RowList) => Ok(Self::RowList),
            (Transport::RowCursor, Representation::DisconnectedRowSet) => {
                Ok(Self::DisconnectedRowSet)
            }
            (transport, representation) => Err(Error::config(format!(
                "{representation} is not available on the {transport} transport"
            ))),
        }
    }

    /// Strategy used when only a transport is chosen.
    pub fn default_for(transport: Transport) -> Self {
        match transport {
            Transport::Columnar => Self::BatchList,
            Transport::RowCursor => Self::DisconnectedRowSet,
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            Self::ConcatenatedBuffer | Self::BatchList => Transport::Columnar,
            Self::ExportedBuffer { .. } | Self::RowList | Self::DisconnectedRowSet => {
                Transport::RowCursor
            }
        }
    }

    pub fn representation(&self) -> Representation {
        match self {
            Self::ConcatenatedBuffer | Self::ExportedBuffer { .. } => {
                Representation::ConcatenatedBuffer
            }
            Self::BatchList => Representation::BatchList,
            Self::RowList => Representation::RowList,
            Self::DisconnectedRowSet => Representation::DisconnectedRowSet,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ConcatenatedBuffer => "ConcatenatedBuffer (columnar transport)",
            Self::BatchList => "BatchList (columnar transport)",
            Self::ExportedBuffer { .. } => "ConcatenatedBuffer (row cursor columnar export)",
            Self::RowList => "RowList (row cursor transport)",
            Self::DisconnectedRowSet => "DisconnectedRowSet (row cursor transport)",
        }
    }

    /// Drain `stream` into this strategy's representation.
    ///
    /// The stream must have been executed on [`Strategy::transport`].
    pub fn materialize(&self, stream: ResultStream<'_>) -> Result<Materialized> {
        match (self, stream) {
            (Self::ConcatenatedBuffer, ResultStream::Columnar(mut batches)) => {
                concatenate(&mut batches).map(Materialized::Buffer)
            }
            (Self::BatchList, ResultStream::Columnar(mut batches)) => {
                collect_batches(&mut batches).map(Materialized::Batches)
            }
            (Self::ExportedBuffer { batch_size }, ResultStream::RowCursor(cursor)) => {
                let mut exported = CursorBatchStream::new(cursor, *batch_size)?;
                concatenate(&mut exported).map(Materialized::Buffer)
            }
            (Self::RowList, ResultStream::RowCursor(mut cursor)) => {
                collect_rows(&mut cursor).map(Materialized::Rows)
            }
            (Self::DisconnectedRowSet, ResultStream::RowCursor(mut cursor)) => {
                DisconnectedRowSet::populate(&mut cursor).map(Materialized::RowSet)
            }
            (strategy, stream) => Err(Error::config(format!(
                "{} needs the {} transport, got {}",
                strategy.label(),
                strategy.transport(),
                stream.transport()
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A fully accumulated result.
#[derive(Debug)]
pub enum Materialized {
    Buffer(ConcatenatedBuffer),
    Batches(BatchList),
    Rows(RowList),
    RowSet(DisconnectedRowSet),
}

impl Materialized {
    /// Rows held. The row set is counted by walking its own cursor.
    pub fn row_count(&self) -> Result<usize> {
        match self {
            Self::Buffer(buffer) => Ok(buffer.row_count()),
            Self::Batches(list) => Ok(list.row_count()),
            Self::Rows(list) => Ok(list.row_count()),
            Self::RowSet(set) => set.count_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_core::stream::{MemoryBatchStream, MemoryRowCursor};
    use rb_core::types::{DataType, Field, Schema, SchemaRef, Value};
    use rb_core::ErrorCategory;
    use std::sync::Arc;

    const ALL: [Strategy; 5] = [
        Strategy::ConcatenatedBuffer,
        Strategy::BatchList,
        Strategy::ExportedBuffer { batch_size: 2 },
        Strategy::RowList,
        Strategy::DisconnectedRowSet,
    ];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, true)]))
    }

    fn row_stream(rows: i64) -> ResultStream<'static> {
        let rows = (0..rows).map(|i| vec![Value::Integer(i)]).collect();
        ResultStream::RowCursor(Box::new(MemoryRowCursor::new(schema(), rows)))
    }

    fn batch_stream(rows: i64) -> ResultStream<'static> {
        let mut exported = CursorBatchStream::new(
            MemoryRowCursor::new(schema(), (0..rows).map(|i| vec![Value::Integer(i)]).collect()),
            3,
        )
        .unwrap();
        let mut batches = Vec::new();
        while let Some(b) = rb_core::stream::BatchStream::next_batch(&mut exported).unwrap() {
            batches.push(b);
        }
        ResultStream::Columnar(Box::new(MemoryBatchStream::new(schema(), batches)))
    }

    fn stream_for(strategy: &Strategy, rows: i64) -> ResultStream<'static> {
        match strategy.transport() {
            Transport::Columnar => batch_stream(rows),
            Transport::RowCursor => row_stream(rows),
        }
    }

    #[test]
    fn pairs_round_trip_through_strategy() {
        for strategy in ALL {
            let back =
                Strategy::from_pair(strategy.transport(), strategy.representation(), 2).unwrap();
            assert_eq!(back, strategy);
        }
    }

    #[test]
    fn unsupported_pairs_are_config_errors() {
        for representation in [Representation::RowList, Representation::DisconnectedRowSet] {
            let err = Strategy::from_pair(Transport::Columnar, representation, 1).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Configuration);
        }
        let err =
            Strategy::from_pair(Transport::RowCursor, Representation::BatchList, 1).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn defaults_per_transport() {
        assert_eq!(Strategy::default_for(Transport::Columnar), Strategy::BatchList);
        assert_eq!(
            Strategy::default_for(Transport::RowCursor),
            Strategy::DisconnectedRowSet
        );
    }

    #[test]
    fn labels_are_distinct() {
        let mut labels: Vec<_> = ALL.iter().map(Strategy::label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), ALL.len());
    }

    #[test]
    fn every_strategy_counts_the_same_rows() {
        for strategy in ALL {
            let materialized = strategy.materialize(stream_for(&strategy, 7)).unwrap();
            assert_eq!(materialized.row_count().unwrap(), 7, "{strategy}");
        }
    }

    #[test]
    fn every_strategy_handles_an_empty_result() {
        for strategy in ALL {
            let materialized = strategy.materialize(stream_for(&strategy, 0)).unwrap();
            assert_eq!(materialized.row_count().unwrap(), 0, "{strategy}");
        }
    }

    #[test]
    fn transport_mismatch_is_rejected() {
        let err = Strategy::RowList.materialize(batch_stream(1)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
