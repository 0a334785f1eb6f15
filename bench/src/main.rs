//! Runs one result materialization strategy and prints its report.
//!
//! The source, query and batch sizes come from `RESULTBENCH_*` environment
//! variables (or a `.env` file). The strategy comes from the command line.
//!
//! Usage:
//!   resultbench --concatenated-buffer
//!   resultbench --transport row-cursor --format json
//!   RESULTBENCH_DB=:memory: resultbench --row-list

use clap::{ArgGroup, Parser, ValueEnum};
use rb_core::stream::Transport;
use resultbench::config::BenchConfig;
use resultbench::instrument::{Instrumentation, MonotonicClock, TrackingAllocator};
use resultbench::report::{print_report, ReportFormat};
use resultbench::selector::{run_benchmark, select, StrategyFlag};
use std::process::ExitCode;

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator::new();

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TransportArg {
    Columnar,
    RowCursor,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Columnar => Transport::Columnar,
            TransportArg::RowCursor => Transport::RowCursor,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "resultbench",
    version,
    about = "Measure the latency and heap cost of materializing a query result"
)]
#[command(group(ArgGroup::new("strategy").multiple(false)))]
struct Cli {
    /// Columnar transport, batches concatenated into one buffer
    #[arg(long, group = "strategy")]
    concatenated_buffer: bool,

    /// Columnar transport, batches kept as a list
    #[arg(long, group = "strategy")]
    batch_list: bool,

    /// Row cursor exported as batches, concatenated into one buffer
    #[arg(long, group = "strategy")]
    exported_buffer: bool,

    /// Row cursor transport, rows collected into a list
    #[arg(long, group = "strategy")]
    row_list: bool,

    /// Row cursor transport, rows materialized into a disconnected row set
    #[arg(long, group = "strategy")]
    disconnected_row_set: bool,

    /// Transport to use; without a strategy flag, picks its default strategy
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
}

impl Cli {
    fn flag(&self) -> Option<StrategyFlag> {
        [
            (self.concatenated_buffer, StrategyFlag::ConcatenatedBuffer),
            (self.batch_list, StrategyFlag::BatchList),
            (self.exported_buffer, StrategyFlag::ExportedBuffer),
            (self.row_list, StrategyFlag::RowList),
            (self.disconnected_row_set, StrategyFlag::DisconnectedRowSet),
        ]
        .into_iter()
        .find_map(|(set, flag)| set.then_some(flag))
    }
}

fn run(cli: &Cli) -> rb_core::Result<()> {
    let config = BenchConfig::from_env()?;

    if let Err(e) = rb_core::initialize_logger(
        config.log_level,
        config.log_file.as_deref().and_then(|p| p.to_str()),
    ) {
        eprintln!("Failed to initialize logger: {e:#}");
    }

    let strategy = select(
        cli.flag(),
        cli.transport.map(Transport::from),
        config.source.export_batch_size,
    )?;

    let clock = MonotonicClock::new();
    let result = run_benchmark(&config, &strategy, Instrumentation::new(&clock, &ALLOCATOR))?;

    print_report(&result, cli.format)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("resultbench: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
