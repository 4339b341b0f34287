//! Authorization request persistence over the flat store.
//!
//! Requests are short-lived: they carry their own expiry and the sweep
//! reclaims them. The authorization-code lookup is claimed with a
//! delete-returning, which is what makes redemption exactly-once.

use async_trait::async_trait;
use sqlx_sqlite::SqlitePool;
use tracing::{debug, instrument};

use skylark_auth::StoreResult;
use skylark_auth::storage::RequestStorage;
use skylark_auth::types::{RequestData, RequestInfo, RequestPatch};

use crate::error::StorageError;
use crate::keys;
use crate::mapping::SingleRelation;
use crate::row::RowStore;

/// SQLite-backed [`RequestStorage`].
#[derive(Debug, Clone)]
pub struct SqliteRequestStorage {
    store: RowStore,
}

impl SqliteRequestStorage {
    /// Create request storage over a connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: RowStore::new(pool),
        }
    }
}

#[async_trait]
impl RequestStorage for SqliteRequestStorage {
    #[instrument(skip(self, data))]
    async fn create_request(&self, request_id: &str, data: RequestData) -> StoreResult<()> {
        let request_key = keys::request_key(request_id);
        let mut tx = self.store.begin().await?;

        if let Some(code) = data.code.as_deref() {
            tx.put_mapping(SingleRelation::AuthorizationCodeRequests, code, &request_key)
                .await?;
        }
        if let Some(device_id) = data.device_id.as_deref() {
            tx.put_mapping(SingleRelation::DeviceRequests, device_id, &request_key)
                .await?;
        }
        tx.put_json(&request_key, keys::REQUEST, &data, data.expires_at)
            .await?;

        tx.commit().await?;
        debug!(request_id, "request created");
        Ok(())
    }

    async fn read_request(&self, request_id: &str) -> StoreResult<Option<RequestData>> {
        Ok(self
            .store
            .get_json::<RequestData>(&keys::request_key(request_id))
            .await?)
    }

    #[instrument(skip(self, patch))]
    async fn update_request(
        &self,
        request_id: &str,
        patch: RequestPatch,
    ) -> StoreResult<Option<RequestData>> {
        let request_key = keys::request_key(request_id);
        let mut tx = self.store.begin().await?;

        let Some(mut data) = tx.get_json::<RequestData>(&request_key).await? else {
            return Ok(None);
        };
        let old_code = data.code.clone();
        let old_device = data.device_id.clone();
        patch.apply(&mut data);

        if old_code != data.code {
            if let Some(old) = old_code.as_deref() {
                tx.remove_mapping(SingleRelation::AuthorizationCodeRequests, old)
                    .await?;
            }
            if let Some(new) = data.code.as_deref() {
                tx.put_mapping(SingleRelation::AuthorizationCodeRequests, new, &request_key)
                    .await?;
            }
        }
        if old_device != data.device_id {
            if let Some(old) = old_device.as_deref() {
                tx.remove_mapping(SingleRelation::DeviceRequests, old).await?;
            }
            if let Some(new) = data.device_id.as_deref() {
                tx.put_mapping(SingleRelation::DeviceRequests, new, &request_key)
                    .await?;
            }
        }

        tx.put_json(&request_key, keys::REQUEST, &data, data.expires_at)
            .await?;
        tx.commit().await?;
        Ok(Some(data))
    }

    #[instrument(skip(self))]
    async fn delete_request(&self, request_id: &str) -> StoreResult<()> {
        // The reverse-mapping cascade retires the code and device
        // lookups pointing at this row; requests hold no set
        // memberships, so nothing else needs pruning.
        self.store.remove(&keys::request_key(request_id)).await?;
        debug!(request_id, "request deleted");
        Ok(())
    }

    #[instrument(skip(self, code))]
    async fn consume_request_code(&self, code: &str) -> StoreResult<Option<RequestInfo>> {
        let mut tx = self.store.begin().await?;

        // Claim the code first: concurrent redeemers serialize on this
        // delete, and the loser observes the mapping already gone.
        let Some(target_key) = tx
            .remove_mapping(SingleRelation::AuthorizationCodeRequests, code)
            .await?
        else {
            return Ok(None);
        };
        let Some(request_id) = keys::local_id(keys::REQUEST, &target_key) else {
            return Err(StorageError::corrupt_data(
                &target_key,
                "mapping target is not a request key",
            )
            .into());
        };
        let request_id = request_id.to_string();

        let Some(removed) = tx.remove(&keys::request_key(&request_id)).await? else {
            // The request was swept out from under its code mapping;
            // commit so the dangler stays gone.
            tx.commit().await?;
            return Ok(None);
        };
        let data: RequestData = removed.decode()?;

        tx.commit().await?;
        debug!(request_id, "authorization code consumed");
        Ok(Some(RequestInfo {
            id: request_id,
            data,
        }))
    }
}
