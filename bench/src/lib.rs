//! Result Materialization Benchmark
//!
//! Measures how the in-memory representation chosen for a query result
//! affects the latency and heap cost of pulling that result out of a data
//! source. The source is SQLite, reached through two transports:
//!
//! - **columnar**: the result arrives as a stream of typed batches and is
//!   either concatenated into one buffer or kept as a list of batches
//! - **row cursor**: the result arrives row by row and is collected into a
//!   row list, a disconnected row set, or exported as batches and
//!   concatenated
//!
//! Run the benchmark: `cargo run --release -- --batch-list`
//! Compare all strategies: `cargo bench`

pub mod accumulate;
pub mod config;
pub mod harness;
pub mod instrument;
pub mod populate;
pub mod report;
pub mod selector;
pub mod source;
pub mod strategy;
