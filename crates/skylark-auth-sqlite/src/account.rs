//! Account persistence over the flat store.
//!
//! The subject is the primary key; handle and email are unique alias
//! mappings pointing back at the account row. The stored record keeps
//! the password hash, which never crosses into the public [`Account`]
//! view. Remembered client authorizations live in their own row per
//! account, and device-account associations are kept as a symmetric
//! pair of membership sets.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx_sqlite::SqlitePool;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use skylark_auth::password::{Argon2PasswordHasher, MAX_PASSWORD_BYTES, PasswordHasher};
use skylark_auth::storage::AccountStorage;
use skylark_auth::types::{
    Account, AuthorizedClientGrant, AuthorizedClients, CreateAccountInput, DeviceAccount,
    DeviceData, TokenData,
};
use skylark_auth::{StoreError, StoreResult, datetime};

use crate::error::{Result, StorageError};
use crate::keys;
use crate::mapping::{MultiRelation, SingleRelation};
use crate::row::RowStore;
use crate::token;

// =============================================================================
// Stored record
// =============================================================================

/// Persisted account row, credential hash included.
///
/// Deliberately not `Debug`: the hash stays out of logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountRecord {
    pub(crate) sub: String,
    pub(crate) handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    pub(crate) password_hash: String,
    #[serde(with = "skylark_auth::datetime")]
    pub(crate) created_at: OffsetDateTime,
}

impl AccountRecord {
    /// Strips the credential material off the stored record.
    pub(crate) fn into_account(self) -> Account {
        Account {
            sub: self.sub,
            handle: self.handle,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

/// Loads the public view of an account by subject.
pub(crate) async fn load_account(store: &RowStore, sub: &str) -> Result<Option<Account>> {
    Ok(store
        .get_json::<AccountRecord>(&keys::account_key(sub))
        .await?
        .map(AccountRecord::into_account))
}

// =============================================================================
// Account storage
// =============================================================================

/// SQLite-backed [`AccountStorage`].
#[derive(Clone)]
pub struct SqliteAccountStorage {
    store: RowStore,
    hasher: Arc<dyn PasswordHasher>,
}

impl SqliteAccountStorage {
    /// Create account storage over a connection pool, hashing passwords
    /// with Argon2id.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_password_hasher(pool, Arc::new(Argon2PasswordHasher::default()))
    }

    /// Create account storage with a custom password hasher.
    #[must_use]
    pub fn with_password_hasher(pool: SqlitePool, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            store: RowStore::new(pool),
            hasher,
        }
    }

    /// Resolves a login identifier to the stored record: handle alias
    /// first, then email alias, then the identifier as a bare subject.
    /// Dangling aliases fall through to the next candidate.
    async fn find_record(&self, identifier: &str) -> StoreResult<Option<AccountRecord>> {
        for relation in [SingleRelation::AccountHandle, SingleRelation::AccountEmail] {
            let Some(target_key) = self.store.get_mapping(relation, identifier).await? else {
                continue;
            };
            if keys::local_id(keys::ACCOUNT, &target_key).is_none() {
                return Err(StorageError::corrupt_data(
                    &target_key,
                    "mapping target is not an account key",
                )
                .into());
            }
            if let Some(record) = self.store.get_json::<AccountRecord>(&target_key).await? {
                return Ok(Some(record));
            }
        }

        Ok(self
            .store
            .get_json::<AccountRecord>(&keys::account_key(identifier))
            .await?)
    }
}

#[async_trait]
impl AccountStorage for SqliteAccountStorage {
    #[instrument(skip(self, input), fields(sub = %input.sub))]
    async fn create_account(&self, input: CreateAccountInput) -> StoreResult<Account> {
        if input.password.len() > MAX_PASSWORD_BYTES {
            return Err(StoreError::validation(format!(
                "password exceeds {MAX_PASSWORD_BYTES} bytes"
            )));
        }

        // Hash outside the scope: key stretching is slow on purpose and
        // must not hold a write transaction open.
        let password_hash = self.hasher.hash_password(&input.password)?;

        let account_key = keys::account_key(&input.sub);
        let mut tx = self.store.begin().await?;

        if tx.get(&account_key).await?.is_some() {
            return Err(StoreError::conflict(format!(
                "account '{}' already exists",
                input.sub
            )));
        }
        if tx
            .get_mapping(SingleRelation::AccountHandle, &input.handle)
            .await?
            .is_some()
        {
            return Err(StoreError::validation(format!(
                "handle '{}' is already taken",
                input.handle
            )));
        }
        if let Some(email) = input.email.as_deref()
            && tx
                .get_mapping(SingleRelation::AccountEmail, email)
                .await?
                .is_some()
        {
            return Err(StoreError::validation("email is already registered"));
        }

        let record = AccountRecord {
            sub: input.sub,
            handle: input.handle,
            email: input.email,
            password_hash,
            created_at: datetime::now_millis(),
        };
        tx.put_json(&account_key, keys::ACCOUNT, &record, None)
            .await?;
        tx.put_mapping(SingleRelation::AccountHandle, &record.handle, &account_key)
            .await?;
        if let Some(email) = record.email.as_deref() {
            tx.put_mapping(SingleRelation::AccountEmail, email, &account_key)
                .await?;
        }

        tx.commit().await?;
        debug!("account created");
        Ok(record.into_account())
    }

    #[instrument(skip(self, identifier, password))]
    async fn authenticate_account(
        &self,
        identifier: &str,
        password: &str,
    ) -> StoreResult<Option<Account>> {
        // Oversized inputs are rejected before stretching, and without
        // revealing whether the identifier exists.
        if password.len() > MAX_PASSWORD_BYTES {
            return Ok(None);
        }

        let Some(record) = self.find_record(identifier).await? else {
            return Ok(None);
        };
        if self.hasher.verify_password(password, &record.password_hash)? {
            Ok(Some(record.into_account()))
        } else {
            Ok(None)
        }
    }

    async fn get_account(&self, sub: &str) -> StoreResult<Option<Account>> {
        Ok(load_account(&self.store, sub).await?)
    }

    async fn set_authorized_client(
        &self,
        sub: &str,
        client_id: &str,
        grant: AuthorizedClientGrant,
    ) -> StoreResult<()> {
        let key = keys::authorized_client_key(sub);
        let mut tx = self.store.begin().await?;

        let mut clients: AuthorizedClients = tx.get_json(&key).await?.unwrap_or_default();
        clients.insert(client_id.to_string(), grant);
        tx.put_json(&key, keys::AUTHORIZED_CLIENT, &clients, None)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_authorized_clients(&self, sub: &str) -> StoreResult<AuthorizedClients> {
        Ok(self
            .store
            .get_json::<AuthorizedClients>(&keys::authorized_client_key(sub))
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn upsert_device_account(&self, device_id: &str, sub: &str) -> StoreResult<()> {
        let mut tx = self.store.begin().await?;

        tx.add_to_multi_mapping(
            MultiRelation::DeviceAccounts,
            device_id,
            &keys::account_key(sub),
        )
        .await?;
        tx.add_to_multi_mapping(MultiRelation::SubDevices, sub, &keys::device_key(device_id))
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_device_account(
        &self,
        device_id: &str,
        sub: &str,
    ) -> StoreResult<Option<Account>> {
        let account_key = keys::account_key(sub);
        let members = self
            .store
            .get_multi_mapping(MultiRelation::DeviceAccounts, device_id)
            .await?
            .unwrap_or_default();
        if !members.iter().any(|member| member == &account_key) {
            return Ok(None);
        }

        let device_key = keys::device_key(device_id);
        let devices = self
            .store
            .get_multi_mapping(MultiRelation::SubDevices, sub)
            .await?
            .unwrap_or_default();
        if !devices.iter().any(|device| device == &device_key) {
            return Ok(None);
        }

        Ok(load_account(&self.store, sub).await?)
    }

    #[instrument(skip(self))]
    async fn remove_device_account(&self, device_id: &str, sub: &str) -> StoreResult<()> {
        let device_key = keys::device_key(device_id);
        let account_key = keys::account_key(sub);
        let mut tx = self.store.begin().await?;

        // This account's tokens on this device go first, through the
        // full token-delete path.
        let targets = tx
            .get_multi_mapping(MultiRelation::DeviceTokens, device_id)
            .await?
            .unwrap_or_default();
        for target_key in &targets {
            let Some(token_id) = keys::local_id(keys::TOKEN, target_key) else {
                continue;
            };
            let Some(data) = tx.get_json::<TokenData>(target_key).await? else {
                continue;
            };
            if data.sub == sub {
                token::delete_token_in_tx(&mut tx, token_id).await?;
            }
        }

        tx.remove_from_multi_mapping(MultiRelation::DeviceAccounts, device_id, &account_key)
            .await?;
        tx.remove_from_multi_mapping(MultiRelation::SubDevices, sub, &device_key)
            .await?;

        tx.commit().await?;
        debug!(device_id, sub, "device account removed");
        Ok(())
    }

    async fn list_device_accounts(&self, sub: &str) -> StoreResult<Vec<DeviceAccount>> {
        let devices = self
            .store
            .get_multi_mapping(MultiRelation::SubDevices, sub)
            .await?
            .unwrap_or_default();
        let Some(account) = load_account(&self.store, sub).await? else {
            return Ok(Vec::new());
        };

        let account_key = keys::account_key(sub);
        let mut associations = Vec::with_capacity(devices.len());
        for device_target in &devices {
            let Some(device_id) = keys::local_id(keys::DEVICE, device_target) else {
                debug!(%device_target, "skipping unresolvable device association");
                continue;
            };
            // Associations are only reported when the device side agrees.
            let members = self
                .store
                .get_multi_mapping(MultiRelation::DeviceAccounts, device_id)
                .await?
                .unwrap_or_default();
            if !members.iter().any(|member| member == &account_key) {
                continue;
            }
            let Some(device) = self.store.get_json::<DeviceData>(device_target).await? else {
                continue;
            };
            associations.push(DeviceAccount {
                device_id: device_id.to_string(),
                device,
                account: account.clone(),
            });
        }

        Ok(associations)
    }
}
