//! Account domain types.
//!
//! The subject (`sub`) is the primary account identifier and is minted
//! by the calling engine; handle and email are unique lookup aliases.
//! Password hashes never leave the storage layer, so the public
//! [`Account`] view carries no credential material.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::device::DeviceData;

/// Public view of a stored account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Primary account identifier.
    pub sub: String,

    /// Unique human-readable handle.
    pub handle: String,

    /// Unique contact email, if one was registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// When the account was created.
    #[serde(with = "crate::datetime")]
    pub created_at: OffsetDateTime,
}

/// Input for account creation.
///
/// Carries the plaintext password on its way to the hasher; it is
/// never persisted and is redacted from debug output.
#[derive(Clone)]
pub struct CreateAccountInput {
    /// Primary account identifier (engine-minted).
    pub sub: String,
    /// Requested handle.
    pub handle: String,
    /// Optional contact email.
    pub email: Option<String>,
    /// Plaintext password.
    pub password: String,
}

impl fmt::Debug for CreateAccountInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAccountInput")
            .field("sub", &self.sub)
            .field("handle", &self.handle)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A client authorization remembered for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedClientGrant {
    /// Scope granted at consent time (space-separated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// When consent was last given.
    #[serde(with = "crate::datetime")]
    pub granted_at: OffsetDateTime,
}

/// All remembered client authorizations for one account, keyed by
/// client id. Insertion order is preserved; re-consent replaces the
/// entry in place.
pub type AuthorizedClients = IndexMap<String, AuthorizedClientGrant>;

/// A device an account is signed in on, with both sides resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceAccount {
    /// Device identifier (without the storage key prefix).
    pub device_id: String,
    /// The resolved device record.
    pub device: DeviceData,
    /// The resolved account.
    pub account: Account,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_account_serialization_round_trip() {
        let account = Account {
            sub: "did:example:alice".to_string(),
            handle: "alice.example.com".to_string(),
            email: Some("alice@example.com".to_string()),
            created_at: datetime!(2024-01-02 03:04:05.678 UTC),
        };
        let json = serde_json::to_string(&account).unwrap();
        let decoded: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account, decoded);
    }

    #[test]
    fn test_create_input_debug_redacts_password() {
        let input = CreateAccountInput {
            sub: "did:example:alice".to_string(),
            handle: "alice.example.com".to_string(),
            email: None,
            password: "hunter2".to_string(),
        };
        let rendered = format!("{input:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_authorized_clients_preserve_insertion_order() {
        let granted_at = datetime!(2024-01-02 03:04:05.678 UTC);
        let mut clients = AuthorizedClients::new();
        clients.insert(
            "https://b.example.com".to_string(),
            AuthorizedClientGrant {
                scope: Some("atproto".to_string()),
                granted_at,
            },
        );
        clients.insert(
            "https://a.example.com".to_string(),
            AuthorizedClientGrant {
                scope: None,
                granted_at,
            },
        );

        let keys: Vec<_> = clients.keys().cloned().collect();
        assert_eq!(keys, vec!["https://b.example.com", "https://a.example.com"]);

        let json = serde_json::to_string(&clients).unwrap();
        let decoded: AuthorizedClients = serde_json::from_str(&json).unwrap();
        assert_eq!(clients, decoded);
    }
}
