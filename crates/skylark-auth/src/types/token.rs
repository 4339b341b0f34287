//! Token domain types.
//!
//! A token record holds everything the authorization engine needs to
//! honor, refresh or revoke an issued token. The storage layer treats
//! `parameters` and `details` as opaque JSON; their shape belongs to
//! the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::types::account::Account;

/// Persisted state of an issued token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    /// Subject the token was issued to.
    pub sub: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Device the token is bound to, when issued from a device session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Granted scope (space-separated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Authorization code the token was exchanged from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Authorization request parameters captured at issuance.
    pub parameters: Value,

    /// Engine-defined auxiliary details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,

    /// When the token was issued.
    #[serde(with = "crate::datetime")]
    pub created_at: OffsetDateTime,

    /// When the token was last rotated or patched.
    #[serde(with = "crate::datetime")]
    pub updated_at: OffsetDateTime,

    /// When the token expires (None = no expiry).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::datetime::option"
    )]
    pub expires_at: Option<OffsetDateTime>,
}

impl TokenData {
    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| OffsetDateTime::now_utc() > exp)
            .unwrap_or(false)
    }
}

/// A token joined with its resolved owning account.
///
/// Storage backends must re-resolve the account on every read; a token
/// whose account no longer resolves is reported as absent rather than
/// returned half-populated.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    /// Token identifier (without the storage key prefix).
    pub id: String,
    /// The persisted token record.
    pub data: TokenData,
    /// The resolved owning account.
    pub account: Account,
}

/// Field-level merge applied during token rotation.
///
/// `None` leaves the field untouched. For clearable fields the payload
/// is doubly optional: `Some(None)` clears, `Some(Some(v))` replaces.
/// `sub` and `client_id` are identity and cannot be patched.
#[derive(Debug, Clone, Default)]
pub struct TokenPatch {
    /// New device binding, or `Some(None)` to unbind.
    pub device_id: Option<Option<String>>,
    /// New granted scope.
    pub scope: Option<Option<String>>,
    /// New originating code.
    pub code: Option<Option<String>>,
    /// Replacement request parameters.
    pub parameters: Option<Value>,
    /// Replacement auxiliary details.
    pub details: Option<Option<Value>>,
    /// New last-updated stamp (rotation passes the rotation instant).
    pub updated_at: Option<OffsetDateTime>,
    /// New expiry, or `Some(None)` to make the token non-expiring.
    pub expires_at: Option<Option<OffsetDateTime>>,
}

impl TokenPatch {
    /// Merges this patch into an existing record.
    pub fn apply(self, data: &mut TokenData) {
        if let Some(device_id) = self.device_id {
            data.device_id = device_id;
        }
        if let Some(scope) = self.scope {
            data.scope = scope;
        }
        if let Some(code) = self.code {
            data.code = code;
        }
        if let Some(parameters) = self.parameters {
            data.parameters = parameters;
        }
        if let Some(details) = self.details {
            data.details = details;
        }
        if let Some(updated_at) = self.updated_at {
            data.updated_at = updated_at;
        }
        if let Some(expires_at) = self.expires_at {
            data.expires_at = expires_at;
        }
    }
}
