//! Authorization request domain types.
//!
//! A request row tracks one in-flight authorization flow from creation
//! until it is exchanged (its code consumed) or expires.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Persisted state of an in-flight authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// Client that opened the flow.
    pub client_id: String,

    /// Subject bound to the flow once the user has authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Device the flow is running on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// One-shot authorization code, present once the flow is approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Authorization parameters as submitted by the client.
    pub parameters: Value,

    /// When the flow was opened.
    #[serde(with = "crate::datetime")]
    pub created_at: OffsetDateTime,

    /// When the flow expires (None = no expiry).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::datetime::option"
    )]
    pub expires_at: Option<OffsetDateTime>,
}

impl RequestData {
    /// Returns `true` if this request has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| OffsetDateTime::now_utc() > exp)
            .unwrap_or(false)
    }
}

/// A request record together with its identifier.
///
/// Returned by code consumption, where the caller starts from the code
/// rather than the id.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    /// Request identifier (without the storage key prefix).
    pub id: String,
    /// The persisted request record.
    pub data: RequestData,
}

/// Field-level merge applied by request updates.
///
/// `None` leaves the field untouched; `Some(None)` clears a clearable
/// field. `client_id` is identity and cannot be patched.
#[derive(Debug, Clone, Default)]
pub struct RequestPatch {
    /// Bind or clear the authenticated subject.
    pub sub: Option<Option<String>>,
    /// Bind or clear the device.
    pub device_id: Option<Option<String>>,
    /// Install or retire the authorization code.
    pub code: Option<Option<String>>,
    /// Replacement authorization parameters.
    pub parameters: Option<Value>,
    /// New expiry, or `Some(None)` to remove it.
    pub expires_at: Option<Option<OffsetDateTime>>,
}

impl RequestPatch {
    /// Merges this patch into an existing record.
    pub fn apply(self, data: &mut RequestData) {
        if let Some(sub) = self.sub {
            data.sub = sub;
        }
        if let Some(device_id) = self.device_id {
            data.device_id = device_id;
        }
        if let Some(code) = self.code {
            data.code = code;
        }
        if let Some(parameters) = self.parameters {
            data.parameters = parameters;
        }
        if let Some(expires_at) = self.expires_at {
            data.expires_at = expires_at;
        }
    }
}
