//! Account storage trait.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::types::{Account, AuthorizedClientGrant, AuthorizedClients, CreateAccountInput, DeviceAccount};

/// Persistence operations for accounts, remembered client
/// authorizations and device-account associations.
#[async_trait]
pub trait AccountStorage: Send + Sync {
    /// Creates an account, hashing its password and registering the
    /// handle and email lookup aliases.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the subject already
    /// exists, and [`StoreError::Validation`] when the handle or email
    /// is taken or the password exceeds the accepted length.
    async fn create_account(&self, input: CreateAccountInput) -> StoreResult<Account>;

    /// Verifies credentials against a stored account.
    ///
    /// The identifier may be a handle, an email or a bare subject.
    /// Unknown identifiers and wrong passwords both yield `Ok(None)`.
    async fn authenticate_account(
        &self,
        identifier: &str,
        password: &str,
    ) -> StoreResult<Option<Account>>;

    /// Reads an account by subject.
    async fn get_account(&self, sub: &str) -> StoreResult<Option<Account>>;

    /// Remembers (or refreshes) a client authorization for an account.
    async fn set_authorized_client(
        &self,
        sub: &str,
        client_id: &str,
        grant: AuthorizedClientGrant,
    ) -> StoreResult<()>;

    /// Returns every remembered client authorization for an account;
    /// accounts without grants yield an empty map.
    async fn get_authorized_clients(&self, sub: &str) -> StoreResult<AuthorizedClients>;

    /// Records that an account is signed in on a device (idempotent
    /// set union on both sides of the association).
    async fn upsert_device_account(&self, device_id: &str, sub: &str) -> StoreResult<()>;

    /// Resolves the account signed in on a device, verifying the
    /// association from both sides.
    async fn get_device_account(&self, device_id: &str, sub: &str)
    -> StoreResult<Option<Account>>;

    /// Signs an account out of a device: its tokens bound to that
    /// device are deleted through the full token-delete path and the
    /// association is removed on both sides.
    ///
    /// Backends without device-account accounting may leave the
    /// default, which fails with [`StoreError::NotImplemented`].
    async fn remove_device_account(&self, device_id: &str, sub: &str) -> StoreResult<()> {
        let _ = (device_id, sub);
        Err(StoreError::not_implemented("remove_device_account"))
    }

    /// Lists every device an account is signed in on, skipping entries
    /// whose records no longer resolve.
    ///
    /// Backends without device-account accounting may leave the
    /// default, which fails with [`StoreError::NotImplemented`].
    async fn list_device_accounts(&self, sub: &str) -> StoreResult<Vec<DeviceAccount>> {
        let _ = sub;
        Err(StoreError::not_implemented("list_device_accounts"))
    }
}
