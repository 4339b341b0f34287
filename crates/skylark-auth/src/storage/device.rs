//! Device session storage trait.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{DeviceData, DevicePatch};

/// Persistence operations for browser/device sessions.
#[async_trait]
pub trait DeviceStorage: Send + Sync {
    /// Stores device metadata, replacing any existing record.
    async fn create_device(&self, device_id: &str, data: DeviceData) -> StoreResult<()>;

    /// Reads device metadata by id.
    async fn read_device(&self, device_id: &str) -> StoreResult<Option<DeviceData>>;

    /// Merges `patch` into stored device metadata.
    ///
    /// Returns the merged record, or `None` (without writing anything)
    /// when the id is unknown.
    async fn update_device(
        &self,
        device_id: &str,
        patch: DevicePatch,
    ) -> StoreResult<Option<DeviceData>>;

    /// Deletes a device and everything anchored to it: every bound
    /// token goes through the full token-delete path, and the device's
    /// account associations are removed on both sides.
    async fn delete_device(&self, device_id: &str) -> StoreResult<()>;
}
