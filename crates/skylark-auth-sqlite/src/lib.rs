//! SQLite storage backend for Skylark Auth
//!
//! Implements the `skylark-auth` storage traits over a single flat
//! `store` table:
//!
//! - Tokens, with refresh-token and authorization-code lookups
//! - In-flight authorization requests with one-shot code redemption
//! - Device sessions and device-account associations
//! - Accounts, credentials and remembered client authorizations
//!
//! Entity rows are keyed `<namespace>:<id>` and carry a JSON payload;
//! secondary lookups are mapping rows keyed `<relation>:<lookup>` whose
//! value is the target key (or a JSON list of them). Removing an entity
//! row cascades over the mappings pointing at it, so lookups never
//! outlive their target silently.
//!
//! # Example
//!
//! ```ignore
//! use skylark_auth_sqlite::{SqliteAuthStorage, SqliteConfig};
//!
//! // In-memory store, migrated and ready.
//! let storage = SqliteAuthStorage::connect(&SqliteConfig::in_memory()).await?;
//!
//! // Use token storage
//! let tokens = storage.tokens();
//! let info = tokens.find_token_by_refresh_token("refresh-1").await?;
//! ```

pub mod account;
pub mod config;
pub mod device;
pub mod error;
mod keys;
pub mod mapping;
pub mod migrations;
pub mod pool;
pub mod request;
pub mod row;
pub mod token;
pub mod transaction;

use std::sync::Arc;

use skylark_auth::password::{Argon2PasswordHasher, PasswordHasher};

/// SQLite connection pool type, re-exported for callers.
pub use sqlx_sqlite::SqlitePool;

pub use account::SqliteAccountStorage;
pub use config::SqliteConfig;
pub use device::SqliteDeviceStorage;
pub use error::{Result, StorageError};
pub use mapping::{MultiRelation, SingleRelation};
pub use pool::create_pool;
pub use request::SqliteRequestStorage;
pub use row::{RowStore, StoreRow};
pub use token::SqliteTokenStorage;
pub use transaction::StoreTransaction;

// =============================================================================
// SQLite Auth Storage
// =============================================================================

/// SQLite storage backend for authentication data.
///
/// Holds a connection pool and hands out the per-entity adapters; all
/// adapters share the pool, so cross-entity cascades observe one
/// consistent store.
#[derive(Clone)]
pub struct SqliteAuthStorage {
    pool: SqlitePool,
    hasher: Arc<dyn PasswordHasher>,
}

impl SqliteAuthStorage {
    /// Create new storage with an existing connection pool, hashing
    /// passwords with Argon2id.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hasher: Arc::new(Argon2PasswordHasher::default()),
        }
    }

    /// Replaces the password hasher used by account storage.
    #[must_use]
    pub fn with_password_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Create new storage by opening (and, unless disabled, migrating)
    /// the configured database.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration
    /// fails.
    pub async fn connect(config: &SqliteConfig) -> Result<Self> {
        let pool = pool::create_pool(config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        Ok(Self::new(pool))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get raw row and mapping operations.
    #[must_use]
    pub fn rows(&self) -> RowStore {
        RowStore::new(self.pool.clone())
    }

    /// Get token storage operations.
    #[must_use]
    pub fn tokens(&self) -> SqliteTokenStorage {
        SqliteTokenStorage::new(self.pool.clone())
    }

    /// Get authorization request storage operations.
    #[must_use]
    pub fn requests(&self) -> SqliteRequestStorage {
        SqliteRequestStorage::new(self.pool.clone())
    }

    /// Get device session storage operations.
    #[must_use]
    pub fn devices(&self) -> SqliteDeviceStorage {
        SqliteDeviceStorage::new(self.pool.clone())
    }

    /// Get account storage operations.
    #[must_use]
    pub fn accounts(&self) -> SqliteAccountStorage {
        SqliteAccountStorage::with_password_hasher(self.pool.clone(), Arc::clone(&self.hasher))
    }
}
