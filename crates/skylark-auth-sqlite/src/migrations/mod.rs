//! Database migration management for the SQLite storage backend.
//!
//! Migrations are embedded in the binary at compile time so deployment
//! needs no filesystem access beyond the database file itself.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType};
use sqlx_sqlite::SqlitePool;
use tracing::{info, instrument};

use crate::error::Result;

/// Macro to define embedded migrations at compile time.
///
/// Add new migrations here in chronological order. Each entry is a
/// tuple of (version, description, sql_path).
macro_rules! embedded_migrations {
    () => {
        &[
            (
                20250614000001i64,
                "store_schema",
                include_str!("../../migrations/20250614000001_store_schema.sql"),
            ),
            (
                20260118000001i64,
                "store_value_index",
                include_str!("../../migrations/20260118000001_store_value_index.sql"),
            ),
        ]
    };
}

/// Builds a vector of Migration structs from embedded migration data.
fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]), // Empty checksum for embedded migrations
            no_tx: false,                 // Run in transaction
        })
        .collect()
}

/// Runs all pending database migrations using embedded migrations.
///
/// Applied migrations are tracked in the `_sqlx_migrations` table and
/// executed in version order inside transactions.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations (embedded)");

    let migrations = build_migrations();
    info!("Found {} migration(s) to apply", migrations.len());

    let migrator = sqlx_core::migrate::Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| crate::error::StorageError::Migration(format!("Migration failed: {e}")))?;

    info!("Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        let migrations = build_migrations();
        assert!(!migrations.is_empty());

        let versions: Vec<i64> = migrations.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_migrations_create_store_table() {
        let migrations = build_migrations();
        assert!(migrations[0].sql.contains("CREATE TABLE IF NOT EXISTS store"));
    }
}
