//! Strategy selection and the single-run driver.

use crate::config::BenchConfig;
use crate::harness::{BenchmarkResult, Harness};
use crate::instrument::Instrumentation;
use crate::source::SourceConnection;
use crate::strategy::{Representation, Strategy};
use rb_core::stream::Transport;
use rb_core::{Error, Result};

/// Command-line strategy flags. Each names exactly one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyFlag {
    ConcatenatedBuffer,
    BatchList,
    ExportedBuffer,
    RowList,
    DisconnectedRowSet,
}

impl StrategyFlag {
    pub fn pair(self) -> (Transport, Representation) {
        match self {
            Self::ConcatenatedBuffer => (Transport::Columnar, Representation::ConcatenatedBuffer),
            Self::BatchList => (Transport::Columnar, Representation::BatchList),
            Self::ExportedBuffer => (Transport::RowCursor, Representation::ConcatenatedBuffer),
            Self::RowList => (Transport::RowCursor, Representation::RowList),
            Self::DisconnectedRowSet => {
                (Transport::RowCursor, Representation::DisconnectedRowSet)
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ConcatenatedBuffer => "--concatenated-buffer",
            Self::BatchList => "--batch-list",
            Self::ExportedBuffer => "--exported-buffer",
            Self::RowList => "--row-list",
            Self::DisconnectedRowSet => "--disconnected-row-set",
        }
    }
}

/// Resolve the strategy for an optional flag and an optional transport.
///
/// A transport alone picks that transport's default; nothing at all picks
/// the columnar default. A transport contradicting the flag is rejected.
pub fn select(
    flag: Option<StrategyFlag>,
    transport: Option<Transport>,
    export_batch_size: usize,
) -> Result<Strategy> {
    match (flag, transport) {
        (None, None) => Ok(Strategy::default_for(Transport::Columnar)),
        (None, Some(transport)) => Ok(Strategy::default_for(transport)),
        (Some(flag), requested) => {
            let (transport, representation) = flag.pair();
            if let Some(requested) = requested.filter(|r| *r != transport) {
                return Err(Error::config(format!(
                    "{} uses the {transport} transport, not {requested}",
                    flag.name()
                )));
            }
            Strategy::from_pair(transport, representation, export_batch_size)
        }
    }
}

/// Open the configured source, run `strategy` once and close the source.
///
/// A failure to close is logged; it does not replace a result that was
/// already measured.
pub fn run_benchmark(
    config: &BenchConfig,
    strategy: &Strategy,
    instruments: Instrumentation<'_>,
) -> Result<BenchmarkResult> {
    let source = SourceConnection::open(&config.source)?;
    log::info!("running {strategy} against {}", source.location());

    let outcome = Harness::new(instruments).run(&source, &config.query, strategy);

    if let Err(e) = source.close() {
        log::warn!("{e}");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_core::ErrorCategory;

    const FLAGS: [StrategyFlag; 5] = [
        StrategyFlag::ConcatenatedBuffer,
        StrategyFlag::BatchList,
        StrategyFlag::ExportedBuffer,
        StrategyFlag::RowList,
        StrategyFlag::DisconnectedRowSet,
    ];

    #[test]
    fn each_flag_selects_its_pair() {
        for flag in FLAGS {
            let strategy = select(Some(flag), None, 64).unwrap();
            assert_eq!((strategy.transport(), strategy.representation()), flag.pair());
        }
        assert_eq!(
            select(Some(StrategyFlag::ExportedBuffer), None, 64).unwrap(),
            Strategy::ExportedBuffer { batch_size: 64 }
        );
    }

    #[test]
    fn matching_transport_is_accepted() {
        let strategy = select(Some(StrategyFlag::RowList), Some(Transport::RowCursor), 1).unwrap();
        assert_eq!(strategy, Strategy::RowList);
    }

    #[test]
    fn contradicting_transport_is_rejected() {
        let err = select(Some(StrategyFlag::BatchList), Some(Transport::RowCursor), 1).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("--batch-list"));
    }

    #[test]
    fn defaults() {
        assert_eq!(select(None, None, 1).unwrap(), Strategy::BatchList);
        assert_eq!(
            select(None, Some(Transport::Columnar), 1).unwrap(),
            Strategy::BatchList
        );
        assert_eq!(
            select(None, Some(Transport::RowCursor), 1).unwrap(),
            Strategy::DisconnectedRowSet
        );
    }
}
