//! # skylark-auth
//!
//! Storage traits and domain types for the Skylark OAuth persistence
//! layer.
//!
//! The authorization engine itself lives elsewhere; this crate defines
//! the contract between it and a storage backend:
//! - Token issuance, rotation, revocation and index lookups
//! - In-flight authorization requests with one-shot code redemption
//! - Device sessions and device-account associations
//! - Accounts, credentials and remembered client authorizations
//!
//! ## Modules
//!
//! - [`storage`] - The four backend traits
//! - [`types`] - Domain records and merge patches
//! - [`error`] - Error taxonomy shared by every backend
//! - [`password`] - Pluggable credential hashing
//! - [`datetime`] - The wire datetime encoding

pub mod datetime;
pub mod error;
pub mod password;
pub mod storage;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use password::{Argon2PasswordHasher, MAX_PASSWORD_BYTES, PasswordHasher};
pub use storage::{AccountStorage, DeviceStorage, RequestStorage, TokenStorage};
pub use types::{
    Account, AuthorizedClientGrant, AuthorizedClients, CreateAccountInput, DeviceAccount,
    DeviceData, DevicePatch, RequestData, RequestInfo, RequestPatch, TokenData, TokenInfo,
    TokenPatch,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use skylark_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::password::{Argon2PasswordHasher, PasswordHasher};
    pub use crate::storage::{AccountStorage, DeviceStorage, RequestStorage, TokenStorage};
    pub use crate::types::{
        Account, AuthorizedClientGrant, AuthorizedClients, CreateAccountInput, DeviceAccount,
        DeviceData, DevicePatch, RequestData, RequestInfo, RequestPatch, TokenData, TokenInfo,
        TokenPatch,
    };
}
