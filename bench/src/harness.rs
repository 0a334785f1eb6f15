//! Instrumentation harness: times one strategy and measures its memory cost.

use crate::instrument::Instrumentation;
use crate::source::SourceConnection;
use crate::strategy::{Materialized, Strategy};
use rb_core::stream::{ResultStream, Transport};
use rb_core::Result;
use serde::Serialize;
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of one benchmark run.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    label: String,
    transport: Transport,
    elapsed_ms: f64,
    row_count: usize,
    memory_delta_mb: f64,
}

impl BenchmarkResult {
    fn new(strategy: &Strategy, elapsed: Duration, row_count: usize, memory_delta: i64) -> Self {
        Self {
            label: strategy.label().to_owned(),
            transport: strategy.transport(),
            elapsed_ms: round2(elapsed.as_secs_f64() * 1000.0),
            row_count,
            memory_delta_mb: round2(memory_delta as f64 / BYTES_PER_MB),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Query execution plus transfer time, in milliseconds to two decimals.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Heap bytes held after the run minus before it, in MiB to two
    /// decimals. Negative when the run freed more than it kept.
    pub fn memory_delta_mb(&self) -> f64 {
        self.memory_delta_mb
    }
}

/// Round to two decimals. A result of zero is always `+0.0`, so a tiny
/// negative delta never prints as `-0.00`.
fn round2(v: f64) -> f64 {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn signed_delta(before: usize, after: usize) -> i64 {
    if after >= before {
        i64::try_from(after - before).unwrap_or(i64::MAX)
    } else {
        i64::try_from(before - after).map_or(i64::MIN, |d| -d)
    }
}

pub struct Harness<'a> {
    instruments: Instrumentation<'a>,
}

impl<'a> Harness<'a> {
    pub fn new(instruments: Instrumentation<'a>) -> Self {
        Self { instruments }
    }

    /// Execute `sql` on `source` with `strategy` and measure it.
    ///
    /// The clock covers prepare, execute and accumulation. Memory is sampled
    /// before the clock starts and again while the materialized result is
    /// still alive. Any error aborts the run and no result is produced.
    pub fn run(
        &self,
        source: &SourceConnection,
        sql: &str,
        strategy: &Strategy,
    ) -> Result<BenchmarkResult> {
        let clock = self.instruments.clock;
        self.measure(strategy, |start| {
            source.execute_query(sql, strategy.transport(), |stream| {
                let materialized = strategy.materialize(stream)?;
                Ok((materialized, clock.now().saturating_sub(start)))
            })
        })
    }

    /// Measure `strategy` over a stream that is already executing. Only the
    /// accumulation is timed.
    pub fn run_stream(
        &self,
        strategy: &Strategy,
        stream: ResultStream<'_>,
    ) -> Result<BenchmarkResult> {
        let clock = self.instruments.clock;
        self.measure(strategy, move |start| {
            let materialized = strategy.materialize(stream)?;
            Ok((materialized, clock.now().saturating_sub(start)))
        })
    }

    fn measure<F>(&self, strategy: &Strategy, body: F) -> Result<BenchmarkResult>
    where
        F: FnOnce(Duration) -> Result<(Materialized, Duration)>,
    {
        let memory = self.instruments.memory;
        let before = memory.bytes_in_use();
        memory.reset_peak();
        let start = self.instruments.clock.now();

        let (materialized, elapsed) = body(start)?;

        let after = memory.bytes_in_use();
        let row_count = materialized.row_count()?;
        log::debug!(
            "{strategy}: peak {} bytes above baseline",
            memory.peak_bytes().saturating_sub(before)
        );
        drop(materialized);

        let delta = signed_delta(before, after);
        let result = BenchmarkResult::new(strategy, elapsed, row_count, delta);
        log::info!(
            "{}: {} rows in {:.2} ms",
            result.label(),
            result.row_count(),
            result.elapsed_ms()
        );
        Ok(result)
    }
}
