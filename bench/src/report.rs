//! Report module: prints a benchmark result to stdout.

use crate::harness::BenchmarkResult;
use clap::ValueEnum;
use rb_core::Error;
use std::io::{self, Write};

/// Printed after the text report: the memory figure is a post-hoc delta.
pub const MEMORY_NOTE: &str = "Note: heap memory delta is sampled once after the transfer \
     completes while the result is still held; transient peaks (such as buffer growth) \
     are not included.";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// One line per field, followed by a note on the memory metric.
    #[default]
    Text,
    /// One JSON object.
    Json,
}

pub fn write_report<W: Write>(
    out: &mut W,
    result: &BenchmarkResult,
    format: ReportFormat,
) -> io::Result<()> {
    match format {
        ReportFormat::Text => {
            writeln!(out, "Result materialization: {}", result.label())?;
            writeln!(
                out,
                "Query execution and result transfer time: {:.2} ms",
                result.elapsed_ms()
            )?;
            writeln!(out, "Number of rows: {}", result.row_count())?;
            writeln!(out, "Heap memory delta: {:.2} MB", result.memory_delta_mb())?;
            writeln!(out, "{MEMORY_NOTE}")
        }
        ReportFormat::Json => {
            serde_json::to_writer(&mut *out, result)?;
            writeln!(out)
        }
    }
}

/// Write and flush the report; any I/O failure is an `Output` error.
pub fn emit_report<W: Write>(
    out: &mut W,
    result: &BenchmarkResult,
    format: ReportFormat,
) -> rb_core::Result<()> {
    write_report(out, result, format)
        .and_then(|()| out.flush())
        .map_err(Error::output)
}

/// Write the report to stdout.
pub fn print_report(result: &BenchmarkResult, format: ReportFormat) -> rb_core::Result<()> {
    let stdout = io::stdout();
    emit_report(&mut stdout.lock(), result, format)
}
