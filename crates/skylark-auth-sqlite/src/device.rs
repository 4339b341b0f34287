//! Device session persistence over the flat store.
//!
//! A device row holds browser/session metadata and never expires on
//! its own; deleting one takes down everything anchored to it so no
//! token outlives the device it was bound to.

use async_trait::async_trait;
use sqlx_sqlite::SqlitePool;
use tracing::{debug, instrument};

use skylark_auth::StoreResult;
use skylark_auth::storage::DeviceStorage;
use skylark_auth::types::{DeviceData, DevicePatch};

use crate::keys;
use crate::mapping::{MultiRelation, SingleRelation};
use crate::row::RowStore;
use crate::token;

/// SQLite-backed [`DeviceStorage`].
#[derive(Debug, Clone)]
pub struct SqliteDeviceStorage {
    store: RowStore,
}

impl SqliteDeviceStorage {
    /// Create device storage over a connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: RowStore::new(pool),
        }
    }
}

#[async_trait]
impl DeviceStorage for SqliteDeviceStorage {
    #[instrument(skip(self, data))]
    async fn create_device(&self, device_id: &str, data: DeviceData) -> StoreResult<()> {
        self.store
            .put_json(&keys::device_key(device_id), keys::DEVICE, &data, None)
            .await?;
        debug!(device_id, "device stored");
        Ok(())
    }

    async fn read_device(&self, device_id: &str) -> StoreResult<Option<DeviceData>> {
        Ok(self
            .store
            .get_json::<DeviceData>(&keys::device_key(device_id))
            .await?)
    }

    #[instrument(skip(self, patch))]
    async fn update_device(
        &self,
        device_id: &str,
        patch: DevicePatch,
    ) -> StoreResult<Option<DeviceData>> {
        let device_key = keys::device_key(device_id);
        let mut tx = self.store.begin().await?;

        let Some(mut data) = tx.get_json::<DeviceData>(&device_key).await? else {
            return Ok(None);
        };
        patch.apply(&mut data);
        tx.put_json(&device_key, keys::DEVICE, &data, None).await?;

        tx.commit().await?;
        Ok(Some(data))
    }

    #[instrument(skip(self))]
    async fn delete_device(&self, device_id: &str) -> StoreResult<()> {
        let device_key = keys::device_key(device_id);
        let mut tx = self.store.begin().await?;

        // Bound tokens die with the device, through the full
        // token-delete path so their refresh tokens and account
        // memberships retire too.
        let targets = tx
            .get_multi_mapping(MultiRelation::DeviceTokens, device_id)
            .await?
            .unwrap_or_default();
        for target_key in &targets {
            let Some(token_id) = keys::local_id(keys::TOKEN, target_key) else {
                debug!(%target_key, "skipping unresolvable device token");
                continue;
            };
            token::delete_token_in_tx(&mut tx, token_id).await?;
        }
        // Each token delete pruned its own membership; this clears
        // whatever unresolvable entries were skipped.
        tx.remove_multi_mapping(MultiRelation::DeviceTokens, device_id)
            .await?;

        // Account associations come off both sides.
        let members = tx
            .get_multi_mapping(MultiRelation::DeviceAccounts, device_id)
            .await?
            .unwrap_or_default();
        for account_key in &members {
            if let Some(sub) = keys::local_id(keys::ACCOUNT, account_key) {
                tx.remove_from_multi_mapping(MultiRelation::SubDevices, sub, &device_key)
                    .await?;
            }
        }
        tx.remove_multi_mapping(MultiRelation::DeviceAccounts, device_id)
            .await?;

        // A pending request lookup keyed by this device must not
        // outlive it; the request row itself is left to its expiry.
        tx.remove_mapping(SingleRelation::DeviceRequests, device_id)
            .await?;

        // The row removal also cascades any token-to-device binding
        // still pointing here. Unknown devices run the same cleanup:
        // associations can exist without a device row.
        tx.remove(&device_key).await?;

        tx.commit().await?;
        debug!(device_id, "device deleted");
        Ok(())
    }
}
