//! Device session domain types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Persisted metadata for a browser/device session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceData {
    /// User agent reported at last sight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Remote address reported at last sight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Engine-issued session cookie identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// When the device was last seen.
    #[serde(with = "crate::datetime")]
    pub last_seen_at: OffsetDateTime,
}

/// Field-level merge applied by device metadata updates.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    /// New user agent, or `Some(None)` to clear it.
    pub user_agent: Option<Option<String>>,
    /// New remote address, or `Some(None)` to clear it.
    pub ip_address: Option<Option<String>>,
    /// New session identifier, or `Some(None)` to clear it.
    pub session_id: Option<Option<String>>,
    /// New last-seen stamp.
    pub last_seen_at: Option<OffsetDateTime>,
}

impl DevicePatch {
    /// Merges this patch into an existing record.
    pub fn apply(self, data: &mut DeviceData) {
        if let Some(user_agent) = self.user_agent {
            data.user_agent = user_agent;
        }
        if let Some(ip_address) = self.ip_address {
            data.ip_address = ip_address;
        }
        if let Some(session_id) = self.session_id {
            data.session_id = session_id;
        }
        if let Some(last_seen_at) = self.last_seen_at {
            data.last_seen_at = last_seen_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_serialization_round_trip() {
        let data = DeviceData {
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: Some("203.0.113.7".to_string()),
            session_id: Some("ses-1".to_string()),
            last_seen_at: datetime!(2024-01-02 03:04:05.678 UTC),
        };
        let json = serde_json::to_string(&data).unwrap();
        let decoded: DeviceData = serde_json::from_str(&json).unwrap();
        assert_eq!(data, decoded);
    }

    #[test]
    fn test_patch_touch_updates_last_seen() {
        let mut data = DeviceData {
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: Some("203.0.113.7".to_string()),
            session_id: None,
            last_seen_at: datetime!(2024-01-02 03:04:05.678 UTC),
        };
        let seen = datetime!(2024-01-03 10:00:00.000 UTC);

        let patch = DevicePatch {
            last_seen_at: Some(seen),
            ip_address: Some(None),
            ..DevicePatch::default()
        };
        patch.apply(&mut data);

        assert_eq!(data.last_seen_at, seen);
        assert_eq!(data.ip_address, None);
        assert_eq!(data.user_agent.as_deref(), Some("Mozilla/5.0"));
    }
}
