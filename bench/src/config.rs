//! Run configuration from `RESULTBENCH_*` environment variables.
//!
//! A `.env` file in the working directory is loaded first if present; real
//! environment variables take precedence over it.

use crate::source::{
    SourceConfig, SourceLocation, DEFAULT_BATCH_SIZE, DEFAULT_EXPORT_BATCH_SIZE,
    DEFAULT_SYNTHETIC_ROWS, MAX_BATCH_SIZE,
};
use log::LevelFilter;
use rb_core::{Error, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DB: &str = "tpch_lineitem.sqlite";
pub const DEFAULT_QUERY: &str = "SELECT * FROM lineitem;";

pub const ENV_DB: &str = "RESULTBENCH_DB";
pub const ENV_QUERY: &str = "RESULTBENCH_QUERY";
pub const ENV_BATCH_SIZE: &str = "RESULTBENCH_BATCH_SIZE";
pub const ENV_EXPORT_BATCH_SIZE: &str = "RESULTBENCH_EXPORT_BATCH_SIZE";
pub const ENV_SYNTHETIC_ROWS: &str = "RESULTBENCH_SYNTHETIC_ROWS";
pub const ENV_LOG_LEVEL: &str = "RESULTBENCH_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "RESULTBENCH_LOG_FILE";

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub source: SourceConfig,
    pub query: String,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            query: DEFAULT_QUERY.to_owned(),
            log_level: LevelFilter::Warn,
            log_file: None,
        }
    }
}

impl BenchConfig {
    /// Read the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self> {
        // Runs before the logger exists, so nothing here may log.
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::config(format!("cannot read .env: {e}"))),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let location = SourceLocation::parse(value(ENV_DB).as_deref().unwrap_or(DEFAULT_DB));
        let source = SourceConfig {
            location,
            batch_size: batch_size(ENV_BATCH_SIZE, value(ENV_BATCH_SIZE), DEFAULT_BATCH_SIZE)?,
            export_batch_size: batch_size(
                ENV_EXPORT_BATCH_SIZE,
                value(ENV_EXPORT_BATCH_SIZE),
                DEFAULT_EXPORT_BATCH_SIZE,
            )?,
            synthetic_rows: count(
                ENV_SYNTHETIC_ROWS,
                value(ENV_SYNTHETIC_ROWS),
                DEFAULT_SYNTHETIC_ROWS,
            )?,
        };

        let log_level = match value(ENV_LOG_LEVEL) {
            Some(raw) => parse_log_level(&raw).ok_or_else(|| {
                Error::config(format!("{ENV_LOG_LEVEL}: unknown log level '{raw}'"))
            })?,
            None => LevelFilter::Warn,
        };

        let log_file = value(ENV_LOG_FILE)
            .filter(|v| !v.eq_ignore_ascii_case("none"))
            .map(PathBuf::from);

        Ok(Self {
            source,
            query: value(ENV_QUERY).unwrap_or_else(|| DEFAULT_QUERY.to_owned()),
            log_level,
            log_file,
        })
    }
}

pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn count(key: &str, raw: Option<String>, default: usize) -> Result<usize> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .replace('_', "")
            .parse::<usize>()
            .map_err(|e| Error::config(format!("{key}: '{raw}' is not a row count: {e}"))),
    }
}

fn batch_size(key: &str, raw: Option<String>, default: usize) -> Result<usize> {
    match count(key, raw, default)? {
        0 => Err(Error::config(format!("{key} must be at least 1"))),
        n if n > MAX_BATCH_SIZE => Err(Error::config(format!(
            "{key} must be at most {MAX_BATCH_SIZE}, got {n}"
        ))),
        n => Ok(n),
    }
}
