//! Transactional scope over the store.
//!
//! Adapters group their multi-row updates (entity row plus its mapping
//! rows) into one scope so readers never observe a half-applied change.

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx_sqlite::SqliteTransaction;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::Result;
use crate::mapping::{self, MultiRelation, SingleRelation};
use crate::row::{self, StoreRow};

/// A transactional scope mirroring the [`RowStore`](crate::row::RowStore)
/// operation surface.
///
/// Every call sees the scope's own uncommitted writes; nothing is
/// visible to other connections until [`StoreTransaction::commit`].
/// Dropping the scope uncommitted rolls back: sqlx issues the ROLLBACK
/// when the inner transaction is dropped.
pub struct StoreTransaction {
    tx: SqliteTransaction<'static>,
}

impl StoreTransaction {
    pub(crate) fn new(tx: SqliteTransaction<'static>) -> Self {
        Self { tx }
    }

    /// Commits every operation performed in this scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the scope is consumed
    /// either way.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        debug!("store transaction committed");
        Ok(())
    }

    /// Rolls back every operation performed in this scope.
    ///
    /// Dropping the scope without committing has the same effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        debug!("store transaction rolled back");
        Ok(())
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Reads a row by key, seeing this scope's uncommitted writes.
    pub async fn get(&mut self, key: &str) -> Result<Option<StoreRow>> {
        row::get(&mut self.tx, key).await
    }

    /// Reads a row by key and decodes its JSON payload.
    pub async fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        row::get_json(&mut self.tx, key).await
    }

    /// Inserts or replaces a row.
    pub async fn put(
        &mut self,
        key: &str,
        row_type: &str,
        value: &str,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<()> {
        row::put(&mut self.tx, key, row_type, value, expires_at).await
    }

    /// Inserts or replaces a row with a JSON-encoded payload.
    pub async fn put_json<T: Serialize>(
        &mut self,
        key: &str,
        row_type: &str,
        value: &T,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<()> {
        row::put_json(&mut self.tx, key, row_type, value, expires_at).await
    }

    /// Removes a row, returning it, and retires every single-valued
    /// mapping row pointing at it.
    pub async fn remove(&mut self, key: &str) -> Result<Option<StoreRow>> {
        row::remove(&mut self.tx, key).await
    }

    /// Deletes every row whose expiry is strictly before `cutoff`.
    pub async fn remove_expired(&mut self, cutoff: OffsetDateTime) -> Result<u64> {
        row::remove_expired(&mut self.tx, cutoff).await
    }

    // =========================================================================
    // Mapping index
    // =========================================================================

    /// Installs or replaces a single-valued mapping.
    pub async fn put_mapping(
        &mut self,
        relation: SingleRelation,
        lookup: &str,
        target_key: &str,
    ) -> Result<()> {
        mapping::put_mapping(&mut self.tx, relation, lookup, target_key).await
    }

    /// Resolves a single-valued mapping to its target key.
    pub async fn get_mapping(
        &mut self,
        relation: SingleRelation,
        lookup: &str,
    ) -> Result<Option<String>> {
        mapping::get_mapping(&mut self.tx, relation, lookup).await
    }

    /// Removes a single-valued mapping, returning the prior target key.
    pub async fn remove_mapping(
        &mut self,
        relation: SingleRelation,
        lookup: &str,
    ) -> Result<Option<String>> {
        mapping::remove_mapping(&mut self.tx, relation, lookup).await
    }

    /// Replaces a multi-valued mapping with the given target keys; an
    /// empty set removes the row.
    pub async fn put_multi_mapping(
        &mut self,
        relation: MultiRelation,
        lookup: &str,
        target_keys: &[String],
    ) -> Result<()> {
        mapping::put_multi_mapping(&mut self.tx, relation, lookup, target_keys).await
    }

    /// Resolves a multi-valued mapping to its target key list.
    pub async fn get_multi_mapping(
        &mut self,
        relation: MultiRelation,
        lookup: &str,
    ) -> Result<Option<Vec<String>>> {
        mapping::get_multi_mapping(&mut self.tx, relation, lookup).await
    }

    /// Removes a multi-valued mapping, returning the prior target list.
    pub async fn remove_multi_mapping(
        &mut self,
        relation: MultiRelation,
        lookup: &str,
    ) -> Result<Option<Vec<String>>> {
        mapping::remove_multi_mapping(&mut self.tx, relation, lookup).await
    }

    /// Adds one target key to a multi-valued mapping (set union).
    pub async fn add_to_multi_mapping(
        &mut self,
        relation: MultiRelation,
        lookup: &str,
        target_key: &str,
    ) -> Result<()> {
        mapping::add_to_multi_mapping(&mut self.tx, relation, lookup, target_key).await
    }

    /// Removes one target key from a multi-valued mapping, dropping the
    /// row entirely when the set empties.
    pub async fn remove_from_multi_mapping(
        &mut self,
        relation: MultiRelation,
        lookup: &str,
        target_key: &str,
    ) -> Result<()> {
        mapping::remove_from_multi_mapping(&mut self.tx, relation, lookup, target_key).await
    }

    /// Replaces one target key with another, keeping list order; if the
    /// old key was absent, the new one is appended.
    pub async fn replace_in_multi_mapping(
        &mut self,
        relation: MultiRelation,
        lookup: &str,
        old_target: &str,
        new_target: &str,
    ) -> Result<()> {
        mapping::replace_in_multi_mapping(&mut self.tx, relation, lookup, old_target, new_target)
            .await
    }

    /// Deletes every mapping row of `relation` whose target is
    /// `target_key`, returning how many were removed.
    pub async fn remove_mappings_targeting(
        &mut self,
        relation: SingleRelation,
        target_key: &str,
    ) -> Result<u64> {
        mapping::remove_mappings_targeting(&mut self.tx, relation, target_key).await
    }
}
