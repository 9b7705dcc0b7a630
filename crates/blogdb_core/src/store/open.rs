//! Store bootstrap for file and in-memory SQLite databases.
//!
//! # Invariants
//! - Returned stores have `foreign_keys=ON` and migrations fully applied.
//! - File databases opened through config honor its WAL and busy-timeout
//!   settings.

use super::migrations::apply_migrations;
use super::{SqliteStore, StoreError, StoreResult};
use crate::config::StoreConfig;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
    wal: bool,
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_store(path: impl AsRef<Path>) -> StoreResult<SqliteStore> {
    let options = ConnectionOptions {
        busy_timeout: DEFAULT_BUSY_TIMEOUT,
        wal: true,
    };
    open_logged("file", options, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_store_in_memory() -> StoreResult<SqliteStore> {
    let options = ConnectionOptions {
        busy_timeout: DEFAULT_BUSY_TIMEOUT,
        wal: false,
    };
    open_logged("memory", options, Connection::open_in_memory)
}

/// Opens the database described by `config`; no path means in-memory.
pub fn open_store_with(config: &StoreConfig) -> StoreResult<SqliteStore> {
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
    match &config.database_path {
        Some(path) => open_logged(
            "file",
            ConnectionOptions {
                busy_timeout,
                wal: config.wal,
            },
            || Connection::open(path),
        ),
        None => open_logged(
            "memory",
            ConnectionOptions {
                busy_timeout,
                wal: false,
            },
            Connection::open_in_memory,
        ),
    }
}

fn open_logged(
    mode: &'static str,
    options: ConnectionOptions,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> StoreResult<SqliteStore> {
    let started_at = Instant::now();
    info!("event=db_open module=store status=start mode={mode}");

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=store status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(StoreError::Connection(err.to_string()));
        }
    };

    match bootstrap_connection(&mut conn, options).and_then(|()| SqliteStore::try_new(conn)) {
        Ok(store) => {
            info!(
                "event=db_open module=store status=ok mode={mode} wal={} duration_ms={}",
                options.wal,
                started_at.elapsed().as_millis()
            );
            Ok(store)
        }
        Err(err) => {
            error!(
                "event=db_open module=store status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, options: ConnectionOptions) -> StoreResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(options.busy_timeout)?;
    if options.wal {
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    apply_migrations(conn)?;
    Ok(())
}
