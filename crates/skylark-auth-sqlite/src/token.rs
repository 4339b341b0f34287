//! Token persistence over the flat store.
//!
//! A token row carries the [`TokenData`] payload; around it live the
//! refresh-token and authorization-code lookups, the per-account and
//! per-device membership sets and the token-to-device binding. Every
//! mutation keeps all of them in step inside one transactional scope.

use async_trait::async_trait;
use sqlx_sqlite::SqlitePool;
use tracing::{debug, instrument};

use skylark_auth::storage::TokenStorage;
use skylark_auth::types::{TokenData, TokenInfo, TokenPatch};
use skylark_auth::StoreResult;

use crate::account;
use crate::error::{Result, StorageError};
use crate::keys;
use crate::mapping::{MultiRelation, SingleRelation};
use crate::row::RowStore;
use crate::transaction::StoreTransaction;

/// SQLite-backed [`TokenStorage`].
#[derive(Debug, Clone)]
pub struct SqliteTokenStorage {
    store: RowStore,
}

impl SqliteTokenStorage {
    /// Create token storage over a connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: RowStore::new(pool),
        }
    }

    /// Resolves a mapping target to a token, tolerating dangling
    /// mappings (the sweep removes rows without touching indexes).
    async fn resolve_token_target(&self, target_key: &str) -> StoreResult<Option<TokenInfo>> {
        let Some(token_id) = keys::local_id(keys::TOKEN, target_key) else {
            return Err(
                StorageError::corrupt_data(target_key, "mapping target is not a token key").into(),
            );
        };
        self.read_token(token_id).await
    }
}

/// Removes one token and all its indexes inside an existing scope.
///
/// Removing the row retires the refresh-token and authorization-code
/// mappings through the reverse-mapping cascade; the device binding and
/// the membership sets are pruned explicitly. Unknown ids are a no-op.
pub(crate) async fn delete_token_in_tx(tx: &mut StoreTransaction, token_id: &str) -> Result<()> {
    let token_key = keys::token_key(token_id);
    let Some(removed) = tx.remove(&token_key).await? else {
        return Ok(());
    };
    let data: TokenData = removed.decode()?;

    tx.remove_mapping(SingleRelation::TokenDevice, token_id)
        .await?;
    tx.remove_from_multi_mapping(MultiRelation::AccountTokens, &data.sub, &token_key)
        .await?;
    if let Some(device_id) = data.device_id.as_deref() {
        tx.remove_from_multi_mapping(MultiRelation::DeviceTokens, device_id, &token_key)
            .await?;
    }

    Ok(())
}

#[async_trait]
impl TokenStorage for SqliteTokenStorage {
    #[instrument(skip(self, data, refresh_token))]
    async fn create_token(
        &self,
        token_id: &str,
        data: TokenData,
        refresh_token: Option<&str>,
    ) -> StoreResult<()> {
        let token_key = keys::token_key(token_id);
        let mut tx = self.store.begin().await?;

        if let Some(refresh_token) = refresh_token {
            tx.put_mapping(SingleRelation::RefreshToken, refresh_token, &token_key)
                .await?;
        }
        if let Some(code) = data.code.as_deref() {
            tx.put_mapping(SingleRelation::AuthorizationCode, code, &token_key)
                .await?;
        }

        tx.put_json(&token_key, keys::TOKEN, &data, data.expires_at)
            .await?;
        tx.add_to_multi_mapping(MultiRelation::AccountTokens, &data.sub, &token_key)
            .await?;
        if let Some(device_id) = data.device_id.as_deref() {
            tx.add_to_multi_mapping(MultiRelation::DeviceTokens, device_id, &token_key)
                .await?;
            tx.put_mapping(
                SingleRelation::TokenDevice,
                token_id,
                &keys::device_key(device_id),
            )
            .await?;
        }

        tx.commit().await?;
        debug!(token_id, "token created");
        Ok(())
    }

    async fn read_token(&self, token_id: &str) -> StoreResult<Option<TokenInfo>> {
        let Some(data) = self
            .store
            .get_json::<TokenData>(&keys::token_key(token_id))
            .await?
        else {
            return Ok(None);
        };
        let Some(account) = account::load_account(&self.store, &data.sub).await? else {
            return Ok(None);
        };

        Ok(Some(TokenInfo {
            id: token_id.to_string(),
            data,
            account,
        }))
    }

    #[instrument(skip(self))]
    async fn delete_token(&self, token_id: &str) -> StoreResult<()> {
        let mut tx = self.store.begin().await?;
        delete_token_in_tx(&mut tx, token_id).await?;
        tx.commit().await?;
        debug!(token_id, "token deleted");
        Ok(())
    }

    #[instrument(skip(self, new_refresh_token, patch))]
    async fn rotate_token(
        &self,
        old_token_id: &str,
        new_token_id: &str,
        new_refresh_token: &str,
        patch: TokenPatch,
    ) -> StoreResult<()> {
        let old_key = keys::token_key(old_token_id);
        let new_key = keys::token_key(new_token_id);
        let mut tx = self.store.begin().await?;

        // The losing side of a rotation race finds the row already gone
        // and backs off without writing anything.
        let Some(removed) = tx.remove(&old_key).await? else {
            return Ok(());
        };
        let mut data: TokenData = removed.decode()?;
        let old_device = data.device_id.clone();
        patch.apply(&mut data);

        tx.put_json(&new_key, keys::TOKEN, &data, data.expires_at)
            .await?;
        tx.replace_in_multi_mapping(MultiRelation::AccountTokens, &data.sub, &old_key, &new_key)
            .await?;

        tx.remove_mapping(SingleRelation::TokenDevice, old_token_id)
            .await?;
        match (old_device.as_deref(), data.device_id.as_deref()) {
            (Some(old), Some(new)) if old == new => {
                tx.replace_in_multi_mapping(MultiRelation::DeviceTokens, new, &old_key, &new_key)
                    .await?;
            }
            (old, new) => {
                if let Some(old) = old {
                    tx.remove_from_multi_mapping(MultiRelation::DeviceTokens, old, &old_key)
                        .await?;
                }
                if let Some(new) = new {
                    tx.add_to_multi_mapping(MultiRelation::DeviceTokens, new, &new_key)
                        .await?;
                }
            }
        }
        if let Some(device_id) = data.device_id.as_deref() {
            tx.put_mapping(
                SingleRelation::TokenDevice,
                new_token_id,
                &keys::device_key(device_id),
            )
            .await?;
        }

        // The old refresh token and originating code died with the old
        // row's reverse mappings; only the new refresh token comes back.
        tx.put_mapping(SingleRelation::RefreshToken, new_refresh_token, &new_key)
            .await?;

        tx.commit().await?;
        debug!(old_token_id, new_token_id, "token rotated");
        Ok(())
    }

    async fn find_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> StoreResult<Option<TokenInfo>> {
        let Some(target_key) = self
            .store
            .get_mapping(SingleRelation::RefreshToken, refresh_token)
            .await?
        else {
            return Ok(None);
        };
        self.resolve_token_target(&target_key).await
    }

    async fn find_token_by_code(&self, code: &str) -> StoreResult<Option<TokenInfo>> {
        let Some(target_key) = self
            .store
            .get_mapping(SingleRelation::AuthorizationCode, code)
            .await?
        else {
            return Ok(None);
        };
        self.resolve_token_target(&target_key).await
    }

    async fn list_account_tokens(&self, sub: &str) -> StoreResult<Vec<TokenInfo>> {
        let Some(targets) = self
            .store
            .get_multi_mapping(MultiRelation::AccountTokens, sub)
            .await?
        else {
            return Ok(Vec::new());
        };
        let Some(account) = account::load_account(&self.store, sub).await? else {
            return Ok(Vec::new());
        };

        let mut tokens = Vec::with_capacity(targets.len());
        for target_key in &targets {
            let Some(token_id) = keys::local_id(keys::TOKEN, target_key) else {
                debug!(%target_key, "skipping unresolvable account token");
                continue;
            };
            let Some(data) = self
                .store
                .get_json::<TokenData>(&keys::token_key(token_id))
                .await?
            else {
                continue;
            };
            tokens.push(TokenInfo {
                id: token_id.to_string(),
                data,
                account: account.clone(),
            });
        }

        Ok(tokens)
    }
}
