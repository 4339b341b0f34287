//! Configuration types for the SQLite storage backend.

use serde::{Deserialize, Serialize};

/// Configuration for the SQLite storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Connection URL: `sqlite://path/to/db.sqlite` or `sqlite::memory:`.
    pub url: String,

    /// Connection pool size (maximum number of connections).
    ///
    /// In-memory databases are pinned to a single connection regardless
    /// of this value; a second connection would see a different empty
    /// database.
    pub pool_size: u32,

    /// Connection acquire timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// How long a writer waits on a locked database before failing,
    /// in milliseconds.
    pub busy_timeout_ms: u64,

    /// Whether to run migrations on startup.
    pub run_migrations: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://skylark.db".into(),
            pool_size: 5,
            connect_timeout_ms: 5000,
            busy_timeout_ms: 5000,
            run_migrations: true,
        }
    }
}

impl SqliteConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Creates a configuration for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".into(),
            pool_size: 1,
            ..Default::default()
        }
    }

    /// Returns `true` if the URL names an in-memory database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Sets the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Sets the acquire timeout.
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, timeout: u64) -> Self {
        self.connect_timeout_ms = timeout;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn with_busy_timeout_ms(mut self, timeout: u64) -> Self {
        self.busy_timeout_ms = timeout;
        self
    }

    /// Sets whether to run migrations on startup.
    #[must_use]
    pub fn with_run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }
}
