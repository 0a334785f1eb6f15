//! Data population: generates a synthetic TPC-H `lineitem` table.
//!
//! The benchmark needs a realistic analytical result to transfer: 16 columns
//! mixing integers, `DECIMAL(15,2)` amounts, short flags, `DATE`s held as
//! ISO-8601 text and free-text comments, declared as in TPC-H. Values follow the TPC-H value
//! ranges but not its exact distributions.

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection};

/// Seed used whenever the caller has no reason to pick another one.
pub const DEFAULT_SEED: u64 = 0x7C0D_E5EE_D000_0001;

/// Number of columns in [`LINEITEM_DDL`].
pub const LINEITEM_COLUMNS: usize = 16;

pub const LINEITEM_DDL: &str = "CREATE TABLE lineitem (
    l_orderkey      INTEGER NOT NULL,
    l_partkey       INTEGER NOT NULL,
    l_suppkey       INTEGER NOT NULL,
    l_linenumber    INTEGER NOT NULL,
    l_quantity      DECIMAL(15,2) NOT NULL,
    l_extendedprice DECIMAL(15,2) NOT NULL,
    l_discount      DECIMAL(15,2) NOT NULL,
    l_tax           DECIMAL(15,2) NOT NULL,
    l_returnflag    CHAR(1) NOT NULL,
    l_linestatus    CHAR(1) NOT NULL,
    l_shipdate      DATE NOT NULL,
    l_commitdate    DATE NOT NULL,
    l_receiptdate   DATE NOT NULL,
    l_shipinstruct  CHAR(25) NOT NULL,
    l_shipmode      CHAR(10) NOT NULL,
    l_comment       VARCHAR(44) NOT NULL
)";

const SHIP_INSTRUCT: [&str; 4] = [
    "DELIVER IN PERSON",
    "COLLECT COD",
    "NONE",
    "TAKE BACK RETURN",
];
const SHIP_MODE: [&str; 7] = ["REG AIR", "AIR", "RAIL", "SHIP", "TRUCK", "MAIL", "FOB"];
const COMMENT_WORDS: [&str; 16] = [
    "furiously", "carefully", "quickly", "blithely", "final", "regular", "express", "pending",
    "deposits", "requests", "packages", "accounts", "ideas", "theodolites", "pinto", "beans",
];

/// Days between the first and last TPC-H order date (1992-01-01..1998-08-02).
const ORDER_DATE_SPAN: u64 = 2405;
/// TPC-H "current date": lines received after it are still open.
const CURRENT_DATE: &str = "1995-06-17";

/// Create the `lineitem` table (fails if it already exists).
pub fn create_lineitem(conn: &Connection) -> Result<()> {
    conn.execute_batch(LINEITEM_DDL)
        .context("creating lineitem table")?;
    Ok(())
}

/// Create `lineitem` and fill it with `rows` deterministic synthetic rows.
///
/// All inserts run in one transaction with a cached prepared statement.
pub fn populate_lineitem(conn: &Connection, rows: usize, seed: u64) -> Result<()> {
    create_lineitem(conn)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let epoch = NaiveDate::from_ymd_opt(1992, 1, 1).context("invalid epoch date")?;

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO lineitem VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                                         ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )?;

        let mut orderkey: i64 = 0;
        let mut lines_left = 0u32;
        let mut linenumber = 0u32;
        let mut order_date = epoch;

        for _ in 0..rows {
            // ── Order header: 1..=7 lines per order ─────────────────────
            if lines_left == 0 {
                orderkey += 1;
                lines_left = rng.gen_range(1..=7);
                linenumber = 0;
                order_date = epoch
                    .checked_add_days(Days::new(rng.gen_range(0..ORDER_DATE_SPAN)))
                    .context("order date out of range")?;
            }
            lines_left -= 1;
            linenumber += 1;

            // ── Line values ─────────────────────────────────────────────
            let partkey: i64 = rng.gen_range(1..=200_000);
            let quantity = f64::from(rng.gen_range(1..=50u32));
            let retail_price = 900.0 + (partkey % 20_001) as f64 / 10.0;
            let shipdate = add_days(order_date, rng.gen_range(1..=121))?;
            let commitdate = add_days(order_date, rng.gen_range(30..=90))?;
            let receiptdate = add_days(shipdate, rng.gen_range(1..=30))?;
            let receipt = receiptdate.format("%Y-%m-%d").to_string();

            let (returnflag, linestatus) = if receipt.as_str() <= CURRENT_DATE {
                (if rng.gen_bool(0.5) { "R" } else { "A" }, "F")
            } else {
                ("N", "O")
            };

            stmt.execute(params![
                orderkey,
                partkey,
                rng.gen_range(1..=10_000i64),
                linenumber,
                quantity,
                round_cents(quantity * retail_price),
                f64::from(rng.gen_range(0..=10u32)) / 100.0,
                f64::from(rng.gen_range(0..=8u32)) / 100.0,
                returnflag,
                linestatus,
                shipdate.format("%Y-%m-%d").to_string(),
                commitdate.format("%Y-%m-%d").to_string(),
                receipt,
                SHIP_INSTRUCT[rng.gen_range(0..SHIP_INSTRUCT.len())],
                SHIP_MODE[rng.gen_range(0..SHIP_MODE.len())],
                random_comment(&mut rng),
            ])?;
        }
    }
    tx.commit()?;

    log::debug!("populated lineitem with {rows} rows (seed {seed:#x})");
    Ok(())
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .with_context(|| format!("{date} + {days} days out of range"))
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn random_comment(rng: &mut StdRng) -> String {
    let words = rng.gen_range(2..=6);
    (0..words)
        .map(|_| COMMENT_WORDS[rng.gen_range(0..COMMENT_WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ")
}
