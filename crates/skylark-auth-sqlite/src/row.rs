//! Row-level operations on the flat store.
//!
//! Every record lives in the single `store` table; entity payloads and
//! mapping targets alike are TEXT in the `value` column. Reads never
//! filter on expiry: an expired row stays readable until the sweep
//! removes it, and callers that care check the decoded record.

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_sqlite::{SqliteConnection, SqlitePool};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use skylark_auth::datetime;

use crate::error::{Result, StorageError};
use crate::mapping::{self, MultiRelation, SingleRelation};
use crate::transaction::StoreTransaction;

// =============================================================================
// Types
// =============================================================================

/// A raw record from the `store` table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRow {
    /// Globally unique row key.
    pub key: String,
    /// Entity namespace, or `mapping_<relation>` for mapping rows.
    pub row_type: String,
    /// JSON payload, or mapping target key(s).
    pub value: String,
    /// Row expiry, if any.
    pub expires_at: Option<OffsetDateTime>,
}

impl StoreRow {
    /// Create from a database tuple.
    fn from_tuple(row: (String, String, String, Option<String>)) -> Result<Self> {
        let expires_at = row
            .3
            .map(|encoded| {
                datetime::parse(&encoded).map_err(|e| {
                    StorageError::corrupt_data(&row.0, format!("invalid expiresAt: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            key: row.0,
            row_type: row.1,
            value: row.2,
            expires_at,
        })
    }

    /// Decodes the JSON payload of an entity row.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CorruptData`] if the payload does not
    /// decode as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.value)
            .map_err(|e| StorageError::corrupt_data(&self.key, e.to_string()))
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================
// Shared by the pool-backed RowStore and StoreTransaction so both
// surfaces behave identically.

pub(crate) async fn get(conn: &mut SqliteConnection, key: &str) -> Result<Option<StoreRow>> {
    let row: Option<(String, String, String, Option<String>)> = query_as(
        r#"
        SELECT key, type, value, expiresAt
        FROM store
        WHERE key = $1
        "#,
    )
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(StoreRow::from_tuple).transpose()
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Option<T>> {
    match get(conn, key).await? {
        Some(row) => Ok(Some(row.decode()?)),
        None => Ok(None),
    }
}

pub(crate) async fn put(
    conn: &mut SqliteConnection,
    key: &str,
    row_type: &str,
    value: &str,
    expires_at: Option<OffsetDateTime>,
) -> Result<()> {
    let encoded_expiry = expires_at.map(datetime::format).transpose()?;

    query(
        r#"
        INSERT INTO store (key, type, value, expiresAt)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT(key) DO UPDATE SET
            type = excluded.type,
            value = excluded.value,
            expiresAt = excluded.expiresAt
        "#,
    )
    .bind(key)
    .bind(row_type)
    .bind(value)
    .bind(encoded_expiry)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn put_json<T: Serialize>(
    conn: &mut SqliteConnection,
    key: &str,
    row_type: &str,
    value: &T,
    expires_at: Option<OffsetDateTime>,
) -> Result<()> {
    let payload = serde_json::to_string(value)?;
    put(conn, key, row_type, &payload, expires_at).await
}

/// Removes a row and every single-valued mapping row targeting it.
///
/// Returns the removed row, or `None` if the key was absent (in which
/// case nothing else is touched).
pub(crate) async fn remove(conn: &mut SqliteConnection, key: &str) -> Result<Option<StoreRow>> {
    let row: Option<(String, String, String, Option<String>)> = query_as(
        r#"
        DELETE FROM store
        WHERE key = $1
        RETURNING key, type, value, expiresAt
        "#,
    )
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let removed = StoreRow::from_tuple(row)?;

    let dangling = remove_mappings_to(conn, key).await?;
    if dangling > 0 {
        debug!(key, dangling, "retired mapping rows pointing at removed key");
    }

    Ok(Some(removed))
}

/// Deletes every mapping row whose value equals `key`.
///
/// Only single-valued mappings can match: multi-valued mappings store a
/// JSON list, which never compares equal to a bare key. Adapters prune
/// those sets explicitly.
pub(crate) async fn remove_mappings_to(conn: &mut SqliteConnection, key: &str) -> Result<u64> {
    let result = query(
        r#"
        DELETE FROM store
        WHERE type LIKE 'mapping\_%' ESCAPE '\'
          AND value = $1
        "#,
    )
    .bind(key)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn remove_expired(
    conn: &mut SqliteConnection,
    cutoff: OffsetDateTime,
) -> Result<u64> {
    let encoded_cutoff = datetime::format(cutoff)?;

    let result = query(
        r#"
        DELETE FROM store
        WHERE expiresAt IS NOT NULL
          AND expiresAt < $1
        "#,
    )
    .bind(&encoded_cutoff)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Row store
// =============================================================================

/// Pool-backed handle for row and mapping operations.
///
/// Each method call is its own atomic unit. Use [`RowStore::begin`] to
/// span several operations with one transactional scope.
#[derive(Debug, Clone)]
pub struct RowStore {
    pool: SqlitePool,
}

impl RowStore {
    /// Create a new row store over a connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a transactional scope over the same operation surface.
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be acquired.
    pub async fn begin(&self) -> Result<StoreTransaction> {
        Ok(StoreTransaction::new(self.pool.begin().await?))
    }

    /// Reads a row by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored expiry is
    /// undecodable.
    pub async fn get(&self, key: &str) -> Result<Option<StoreRow>> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, key).await
    }

    /// Reads a row by key and decodes its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CorruptData`] if the payload does not
    /// decode as `T`; decode failures are never silently swallowed.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.pool.acquire().await?;
        get_json(&mut conn, key).await
    }

    /// Inserts or replaces a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    #[instrument(skip(self, value))]
    pub async fn put(
        &self,
        key: &str,
        row_type: &str,
        value: &str,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        put(&mut conn, key, row_type, value, expires_at).await
    }

    /// Inserts or replaces a row with a JSON-encoded payload.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub async fn put_json<T: Serialize>(
        &self,
        key: &str,
        row_type: &str,
        value: &T,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        put_json(&mut conn, key, row_type, value, expires_at).await
    }

    /// Removes a row, returning it, and retires every single-valued
    /// mapping row pointing at it. Both steps commit atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; nothing is removed then.
    #[instrument(skip(self))]
    pub async fn remove(&self, key: &str) -> Result<Option<StoreRow>> {
        let mut tx = self.pool.begin().await?;
        let removed = remove(&mut tx, key).await?;
        tx.commit().await?;
        Ok(removed)
    }

    /// Deletes every row whose expiry is strictly before `cutoff`.
    ///
    /// Rows without an expiry are never touched. Mapping rows orphaned
    /// by the sweep stay behind; readers re-resolve their targets and
    /// report misses as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_expired(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        let swept = remove_expired(&mut conn, cutoff).await?;
        if swept > 0 {
            debug!(swept, "expired rows removed");
        }
        Ok(swept)
    }

    // =========================================================================
    // Mapping index
    // =========================================================================

    /// Installs or replaces a single-valued mapping.
    ///
    /// Lookup keys of single-valued relations can be secrets (refresh
    /// tokens, authorization codes), so they stay out of the span.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    #[instrument(skip(self, lookup, target_key))]
    pub async fn put_mapping(
        &self,
        relation: SingleRelation,
        lookup: &str,
        target_key: &str,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        mapping::put_mapping(&mut conn, relation, lookup, target_key).await
    }

    /// Resolves a single-valued mapping to its target key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_mapping(
        &self,
        relation: SingleRelation,
        lookup: &str,
    ) -> Result<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        mapping::get_mapping(&mut conn, relation, lookup).await
    }

    /// Removes a single-valued mapping, returning the prior target key.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(skip(self, lookup))]
    pub async fn remove_mapping(
        &self,
        relation: SingleRelation,
        lookup: &str,
    ) -> Result<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        mapping::remove_mapping(&mut conn, relation, lookup).await
    }

    /// Replaces a multi-valued mapping with the given target keys,
    /// deduplicated and order-preserving. An empty set removes the row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn put_multi_mapping(
        &self,
        relation: MultiRelation,
        lookup: &str,
        target_keys: &[String],
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        mapping::put_multi_mapping(&mut conn, relation, lookup, target_keys).await
    }

    /// Resolves a multi-valued mapping to its target key list.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored list is
    /// undecodable.
    pub async fn get_multi_mapping(
        &self,
        relation: MultiRelation,
        lookup: &str,
    ) -> Result<Option<Vec<String>>> {
        let mut conn = self.pool.acquire().await?;
        mapping::get_multi_mapping(&mut conn, relation, lookup).await
    }

    /// Removes a multi-valued mapping, returning the prior target list.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_multi_mapping(
        &self,
        relation: MultiRelation,
        lookup: &str,
    ) -> Result<Option<Vec<String>>> {
        let mut conn = self.pool.acquire().await?;
        mapping::remove_multi_mapping(&mut conn, relation, lookup).await
    }

    /// Adds one target key to a multi-valued mapping (set union).
    ///
    /// This is a read-modify-write: concurrent callers outside a
    /// transactional scope are last-writer-wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub async fn add_to_multi_mapping(
        &self,
        relation: MultiRelation,
        lookup: &str,
        target_key: &str,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        mapping::add_to_multi_mapping(&mut conn, relation, lookup, target_key).await
    }

    /// Removes one target key from a multi-valued mapping, dropping the
    /// row entirely when the set empties. Same read-modify-write caveat
    /// as [`RowStore::add_to_multi_mapping`].
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub async fn remove_from_multi_mapping(
        &self,
        relation: MultiRelation,
        lookup: &str,
        target_key: &str,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        mapping::remove_from_multi_mapping(&mut conn, relation, lookup, target_key).await
    }

    /// Replaces one target key with another in a multi-valued mapping,
    /// keeping list order; if the old key was absent, the new one is
    /// appended. Same read-modify-write caveat as
    /// [`RowStore::add_to_multi_mapping`].
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub async fn replace_in_multi_mapping(
        &self,
        relation: MultiRelation,
        lookup: &str,
        old_target: &str,
        new_target: &str,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        mapping::replace_in_multi_mapping(&mut conn, relation, lookup, old_target, new_target).await
    }

    /// Deletes every mapping row of `relation` whose target is
    /// `target_key`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_mappings_targeting(
        &self,
        relation: SingleRelation,
        target_key: &str,
    ) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        mapping::remove_mappings_targeting(&mut conn, relation, target_key).await
    }
}
