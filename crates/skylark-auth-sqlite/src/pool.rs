//! Connection pool management for the SQLite storage backend.

use std::str::FromStr;
use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use tracing::{debug, info, instrument};

use crate::config::SqliteConfig;
use crate::error::Result;

/// Type alias for SQLite pool options.
pub type SqlitePoolOptions = PoolOptions<Sqlite>;

/// Creates a new SQLite connection pool from the given configuration.
#[instrument(skip(config), fields(url = %config.url))]
pub async fn create_pool(config: &SqliteConfig) -> Result<SqlitePool> {
    info!(
        pool_size = config.pool_size,
        connect_timeout_ms = config.connect_timeout_ms,
        busy_timeout_ms = config.busy_timeout_ms,
        in_memory = config.is_in_memory(),
        "Creating SQLite connection pool"
    );

    let mut connect_options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    // WAL only applies to file-backed databases; in-memory databases
    // ignore the pragma.
    if !config.is_in_memory() {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut options = SqlitePoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms));

    // An in-memory database lives and dies with its connection, so the
    // pool is pinned to a single connection that is never recycled.
    if config.is_in_memory() {
        options = options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = options.connect_with(connect_options).await?;

    debug!("SQLite connection pool created successfully");

    Ok(pool)
}
