//! Sqlite-backed observation history store.
//!
//! One row per tick, keyed by arrival timestamp. The live loop appends here;
//! the offline path bulk-loads the whole table, in timestamp order, into the
//! raw observation frame.

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::info;

use crate::features::{frame_from_ticks, Tick};
use crate::frame::Frame;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub fn open_store(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS observations (
            ts_ms_utc INTEGER PRIMARY KEY,
            bitcoin_price REAL NOT NULL,
            bitcoin_volume REAL NOT NULL,
            ethereum_price REAL NOT NULL,
            ethereum_volume REAL NOT NULL,
            litecoin_price REAL NOT NULL,
            litecoin_volume REAL NOT NULL
        );
        ",
    )?;
    Ok(conn)
}

pub fn append_observation(
    conn: &Connection,
    ts_ms_utc: i64,
    tick: &Tick,
) -> Result<(), StoreError> {
    conn.execute(
        "
        INSERT OR REPLACE INTO observations (
            ts_ms_utc,
            bitcoin_price,
            bitcoin_volume,
            ethereum_price,
            ethereum_volume,
            litecoin_price,
            litecoin_volume
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ",
        params![
            ts_ms_utc,
            tick.bitcoin_price,
            tick.bitcoin_volume,
            tick.ethereum_price,
            tick.ethereum_volume,
            tick.litecoin_price,
            tick.litecoin_volume
        ],
    )?;
    Ok(())
}

/// Loads the full observation table in arrival order. Returns the timestamps
/// alongside the raw frame; row index in the frame is the time index.
pub fn load_observations(conn: &Connection) -> Result<(Vec<i64>, Frame), StoreError> {
    let mut stmt = conn.prepare(
        "
        SELECT
            ts_ms_utc,
            bitcoin_price,
            bitcoin_volume,
            ethereum_price,
            ethereum_volume,
            litecoin_price,
            litecoin_volume
        FROM observations
        ORDER BY ts_ms_utc ASC
        ",
    )?;

    let mut rows = stmt.query([])?;
    let mut timestamps = Vec::new();
    let mut ticks = Vec::new();
    while let Some(row) = rows.next()? {
        timestamps.push(row.get(0)?);
        ticks.push(Tick {
            bitcoin_price: row.get(1)?,
            bitcoin_volume: row.get(2)?,
            ethereum_price: row.get(3)?,
            ethereum_volume: row.get(4)?,
            litecoin_price: row.get(5)?,
            litecoin_volume: row.get(6)?,
        });
    }

    info!(
        component = "store",
        event = "store.observations.loaded",
        rows = ticks.len()
    );

    Ok((timestamps, frame_from_ticks(&ticks)))
}
