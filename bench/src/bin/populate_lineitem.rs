//! Writes a synthetic TPC-H `lineitem` table into a SQLite file.
//!
//! Usage:
//!   populate-lineitem tpch_lineitem.sqlite --rows 6000000
//!   populate-lineitem tpch_lineitem.sqlite --force --seed 42

use anyhow::{bail, Context, Result};
use clap::Parser;
use resultbench::populate::{populate_lineitem, DEFAULT_SEED};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "populate-lineitem", version, about = "Create a synthetic lineitem database")]
struct Args {
    /// Database file to create
    #[arg(default_value = "tpch_lineitem.sqlite")]
    path: PathBuf,

    /// Number of rows to generate
    #[arg(long, default_value_t = 1_000_000)]
    rows: usize,

    /// Random seed; the same seed always yields the same rows
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Replace the file if it already exists
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    rb_core::initialize_logger(log::LevelFilter::Info, None)?;

    if args.path.exists() {
        if !args.force {
            bail!("{} already exists (use --force to replace it)", args.path.display());
        }
        std::fs::remove_file(&args.path)
            .with_context(|| format!("removing {}", args.path.display()))?;
    }

    let start = Instant::now();
    let conn = Connection::open(&args.path)
        .with_context(|| format!("creating {}", args.path.display()))?;
    conn.pragma_update(None, "journal_mode", "OFF")?;
    conn.pragma_update(None, "synchronous", "OFF")?;
    populate_lineitem(&conn, args.rows, args.seed)?;
    conn.close().map_err(|(_, e)| e)?;

    log::info!(
        "wrote {} rows to {} in {:.2?}",
        args.rows,
        args.path.display(),
        start.elapsed()
    );
    Ok(())
}
