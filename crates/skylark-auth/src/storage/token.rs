//! Token storage trait.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::types::{TokenData, TokenInfo, TokenPatch};

/// Persistence operations for issued tokens.
///
/// Implementations must keep the token's secondary indexes (refresh
/// token, authorization code, owning account and bound device) in step
/// with the primary record; every multi-step write is all-or-nothing.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Stores a new token and registers all its lookup indexes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the backend fails; no partial
    /// state is left behind.
    async fn create_token(
        &self,
        token_id: &str,
        data: TokenData,
        refresh_token: Option<&str>,
    ) -> StoreResult<()>;

    /// Reads a token by id, resolving its owning account.
    ///
    /// Returns `None` if the token or its account no longer resolves.
    async fn read_token(&self, token_id: &str) -> StoreResult<Option<TokenInfo>>;

    /// Deletes a token and retires every index pointing at it.
    ///
    /// Deleting an unknown id is a no-op.
    async fn delete_token(&self, token_id: &str) -> StoreResult<()>;

    /// Atomically replaces a token under a new id, merging `patch` into
    /// the stored record and installing the new refresh-token index.
    ///
    /// Rotating an id that no longer exists is a no-op: the losing call
    /// of a rotation race observes nothing.
    async fn rotate_token(
        &self,
        old_token_id: &str,
        new_token_id: &str,
        new_refresh_token: &str,
        patch: TokenPatch,
    ) -> StoreResult<()>;

    /// Looks a token up by its current refresh token.
    async fn find_token_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> StoreResult<Option<TokenInfo>>;

    /// Looks a token up by the authorization code it was exchanged from.
    ///
    /// Backends without a code index may leave the default, which fails
    /// with [`StoreError::NotImplemented`].
    async fn find_token_by_code(&self, code: &str) -> StoreResult<Option<TokenInfo>> {
        let _ = code;
        Err(StoreError::not_implemented("find_token_by_code"))
    }

    /// Lists every live token owned by a subject, skipping entries
    /// whose records no longer resolve.
    ///
    /// Backends without an account index may leave the default, which
    /// fails with [`StoreError::NotImplemented`].
    async fn list_account_tokens(&self, sub: &str) -> StoreResult<Vec<TokenInfo>> {
        let _ = sub;
        Err(StoreError::not_implemented("list_account_tokens"))
    }
}
