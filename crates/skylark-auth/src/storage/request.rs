//! Authorization request storage trait.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{RequestData, RequestInfo, RequestPatch};

/// Persistence operations for in-flight authorization requests.
#[async_trait]
pub trait RequestStorage: Send + Sync {
    /// Stores a new request and registers its code and device indexes
    /// when those fields are present.
    async fn create_request(&self, request_id: &str, data: RequestData) -> StoreResult<()>;

    /// Reads a request by id.
    async fn read_request(&self, request_id: &str) -> StoreResult<Option<RequestData>>;

    /// Merges `patch` into a stored request, moving its code and device
    /// indexes when those fields change.
    ///
    /// Returns the merged record, or `None` (without writing anything)
    /// when the id is unknown.
    async fn update_request(
        &self,
        request_id: &str,
        patch: RequestPatch,
    ) -> StoreResult<Option<RequestData>>;

    /// Deletes a request; its code and device indexes are retired with
    /// it. Deleting an unknown id is a no-op.
    async fn delete_request(&self, request_id: &str) -> StoreResult<()>;

    /// Redeems an authorization code exactly once.
    ///
    /// The first call removes both the code index and the request row
    /// and returns the request; every later call with the same code
    /// returns `None`.
    async fn consume_request_code(&self, code: &str) -> StoreResult<Option<RequestInfo>>;
}
