//! Integration tests for the flat row store and mapping index.
//!
//! Covers row round-trips, soft expiry, the reverse-mapping cascade,
//! the expiry sweep, single- and multi-valued mappings and the
//! transactional scope, all against an in-memory database.

use skylark_auth::datetime;
use skylark_auth_sqlite::{
    MultiRelation, RowStore, SingleRelation, SqliteAuthStorage, SqliteConfig, StorageError,
};
use time::Duration;

// =============================================================================
// Test Infrastructure
// =============================================================================

async fn test_store() -> RowStore {
    let storage = SqliteAuthStorage::connect(&SqliteConfig::in_memory())
        .await
        .expect("connect in-memory store");
    storage.rows()
}

// =============================================================================
// Row Operations
// =============================================================================

#[tokio::test]
async fn test_put_get_round_trip() {
    let store = test_store().await;
    let expires_at = datetime::now_millis() + Duration::hours(1);

    store
        .put("token:t1", "token", r#"{"sub":"alice"}"#, Some(expires_at))
        .await
        .expect("put row");

    let row = store
        .get("token:t1")
        .await
        .expect("get row")
        .expect("row present");
    assert_eq!(row.key, "token:t1");
    assert_eq!(row.row_type, "token");
    assert_eq!(row.value, r#"{"sub":"alice"}"#);
    assert_eq!(row.expires_at, Some(expires_at));
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let store = test_store().await;
    let row = store.get("token:absent").await.expect("get row");
    assert!(row.is_none());
}

#[tokio::test]
async fn test_put_replaces_existing_row() {
    let store = test_store().await;

    store
        .put("probe:p1", "probe", "first", None)
        .await
        .expect("put row");
    store
        .put("probe:p1", "probe_v2", "second", None)
        .await
        .expect("replace row");

    let row = store
        .get("probe:p1")
        .await
        .expect("get row")
        .expect("row present");
    assert_eq!(row.row_type, "probe_v2");
    assert_eq!(row.value, "second");
    assert_eq!(row.expires_at, None);
}

#[tokio::test]
async fn test_get_does_not_filter_expired_rows() {
    let store = test_store().await;
    let expired_at = datetime::now_millis() - Duration::hours(1);

    store
        .put("token:stale", "token", "{}", Some(expired_at))
        .await
        .expect("put row");

    // Expiry is advisory on read; only the sweep removes rows.
    let row = store
        .get("token:stale")
        .await
        .expect("get row")
        .expect("expired row still readable");
    assert_eq!(row.expires_at, Some(expired_at));
}

#[tokio::test]
async fn test_remove_returns_prior_row() {
    let store = test_store().await;

    store
        .put("token:t1", "token", "payload", None)
        .await
        .expect("put row");

    let removed = store
        .remove("token:t1")
        .await
        .expect("remove row")
        .expect("row existed");
    assert_eq!(removed.value, "payload");

    assert!(store.get("token:t1").await.expect("get row").is_none());
}

#[tokio::test]
async fn test_remove_missing_is_none() {
    let store = test_store().await;
    let removed = store.remove("token:absent").await.expect("remove row");
    assert!(removed.is_none());
}

#[tokio::test]
async fn test_remove_cascades_single_mappings_only() {
    let store = test_store().await;

    store
        .put("token:t1", "token", "{}", None)
        .await
        .expect("put token row");
    store
        .put_mapping(SingleRelation::RefreshToken, "rt-1", "token:t1")
        .await
        .expect("install refresh mapping");
    store
        .put_multi_mapping(
            MultiRelation::AccountTokens,
            "did:example:alice",
            &["token:t1".to_string()],
        )
        .await
        .expect("install membership");

    store
        .remove("token:t1")
        .await
        .expect("remove row")
        .expect("row existed");

    // The single-valued mapping pointed at the removed key and died
    // with it; the membership list never compares equal to a bare key
    // and stays behind for its owner to prune.
    assert!(
        store
            .get_mapping(SingleRelation::RefreshToken, "rt-1")
            .await
            .expect("get mapping")
            .is_none()
    );
    assert_eq!(
        store
            .get_multi_mapping(MultiRelation::AccountTokens, "did:example:alice")
            .await
            .expect("get membership"),
        Some(vec!["token:t1".to_string()])
    );
}

// =============================================================================
// Expiry Sweep
// =============================================================================

#[tokio::test]
async fn test_remove_expired_is_exact() {
    let store = test_store().await;
    let now = datetime::now_millis();

    store
        .put("probe:expired", "probe", "a", Some(now - Duration::minutes(5)))
        .await
        .expect("put expired row");
    store
        .put("probe:live", "probe", "b", Some(now + Duration::minutes(5)))
        .await
        .expect("put live row");
    store
        .put("probe:immortal", "probe", "c", None)
        .await
        .expect("put immortal row");

    let swept = store.remove_expired(now).await.expect("sweep");
    assert_eq!(swept, 1);

    assert!(store.get("probe:expired").await.expect("get").is_none());
    assert!(store.get("probe:live").await.expect("get").is_some());
    assert!(store.get("probe:immortal").await.expect("get").is_some());
}

#[tokio::test]
async fn test_remove_expired_cutoff_is_exclusive() {
    let store = test_store().await;
    let instant = datetime::now_millis();

    store
        .put("probe:boundary", "probe", "x", Some(instant))
        .await
        .expect("put row");

    // Expiring exactly at the cutoff is not "before" it.
    let swept = store.remove_expired(instant).await.expect("sweep at instant");
    assert_eq!(swept, 0);

    let swept = store
        .remove_expired(instant + Duration::milliseconds(1))
        .await
        .expect("sweep past instant");
    assert_eq!(swept, 1);
}

#[tokio::test]
async fn test_remove_expired_leaves_mappings_dangling() {
    let store = test_store().await;
    let now = datetime::now_millis();

    store
        .put("token:stale", "token", "{}", Some(now - Duration::minutes(1)))
        .await
        .expect("put row");
    store
        .put_mapping(SingleRelation::RefreshToken, "rt-stale", "token:stale")
        .await
        .expect("install mapping");

    let swept = store.remove_expired(now).await.expect("sweep");
    assert_eq!(swept, 1);

    // The sweep does not cascade: the mapping dangles and resolves to
    // a key that no longer exists.
    let target = store
        .get_mapping(SingleRelation::RefreshToken, "rt-stale")
        .await
        .expect("get mapping");
    assert_eq!(target.as_deref(), Some("token:stale"));
    assert!(store.get("token:stale").await.expect("get").is_none());
}

// =============================================================================
// Single-Valued Mappings
// =============================================================================

#[tokio::test]
async fn test_single_mapping_round_trip() {
    let store = test_store().await;

    store
        .put_mapping(SingleRelation::AccountHandle, "alice.example.com", "account:did:example:alice")
        .await
        .expect("install mapping");

    let target = store
        .get_mapping(SingleRelation::AccountHandle, "alice.example.com")
        .await
        .expect("get mapping");
    assert_eq!(target.as_deref(), Some("account:did:example:alice"));

    let prior = store
        .remove_mapping(SingleRelation::AccountHandle, "alice.example.com")
        .await
        .expect("remove mapping");
    assert_eq!(prior.as_deref(), Some("account:did:example:alice"));

    assert!(
        store
            .get_mapping(SingleRelation::AccountHandle, "alice.example.com")
            .await
            .expect("get mapping")
            .is_none()
    );
}

#[tokio::test]
async fn test_single_mapping_is_last_writer_wins() {
    let store = test_store().await;

    store
        .put_mapping(SingleRelation::DeviceRequests, "dev-1", "request:r1")
        .await
        .expect("install mapping");
    store
        .put_mapping(SingleRelation::DeviceRequests, "dev-1", "request:r2")
        .await
        .expect("replace mapping");

    let target = store
        .get_mapping(SingleRelation::DeviceRequests, "dev-1")
        .await
        .expect("get mapping");
    assert_eq!(target.as_deref(), Some("request:r2"));
}

#[tokio::test]
async fn test_relations_with_equal_lookups_do_not_collide() {
    let store = test_store().await;

    store
        .put_mapping(SingleRelation::AuthorizationCode, "shared", "token:t1")
        .await
        .expect("install code mapping");
    store
        .put_mapping(SingleRelation::AuthorizationCodeRequests, "shared", "request:r1")
        .await
        .expect("install request code mapping");

    assert_eq!(
        store
            .get_mapping(SingleRelation::AuthorizationCode, "shared")
            .await
            .expect("get")
            .as_deref(),
        Some("token:t1")
    );
    assert_eq!(
        store
            .get_mapping(SingleRelation::AuthorizationCodeRequests, "shared")
            .await
            .expect("get")
            .as_deref(),
        Some("request:r1")
    );
}

#[tokio::test]
async fn test_remove_mappings_targeting() {
    let store = test_store().await;

    store
        .put_mapping(SingleRelation::RefreshToken, "rt-1", "token:t1")
        .await
        .expect("install mapping");
    store
        .put_mapping(SingleRelation::RefreshToken, "rt-2", "token:t1")
        .await
        .expect("install mapping");
    store
        .put_mapping(SingleRelation::RefreshToken, "rt-3", "token:t2")
        .await
        .expect("install mapping");

    let removed = store
        .remove_mappings_targeting(SingleRelation::RefreshToken, "token:t1")
        .await
        .expect("remove by target");
    assert_eq!(removed, 2);

    assert!(
        store
            .get_mapping(SingleRelation::RefreshToken, "rt-1")
            .await
            .expect("get")
            .is_none()
    );
    assert_eq!(
        store
            .get_mapping(SingleRelation::RefreshToken, "rt-3")
            .await
            .expect("get")
            .as_deref(),
        Some("token:t2")
    );
}

// =============================================================================
// Multi-Valued Mappings
// =============================================================================

#[tokio::test]
async fn test_multi_mapping_dedups_and_preserves_order() {
    let store = test_store().await;

    store
        .put_multi_mapping(
            MultiRelation::AccountTokens,
            "did:example:alice",
            &[
                "token:b".to_string(),
                "token:a".to_string(),
                "token:b".to_string(),
                "token:c".to_string(),
            ],
        )
        .await
        .expect("put multi mapping");

    let targets = store
        .get_multi_mapping(MultiRelation::AccountTokens, "did:example:alice")
        .await
        .expect("get multi mapping")
        .expect("mapping present");
    assert_eq!(targets, vec!["token:b", "token:a", "token:c"]);
}

#[tokio::test]
async fn test_put_multi_mapping_empty_removes_row() {
    let store = test_store().await;

    store
        .put_multi_mapping(
            MultiRelation::DeviceTokens,
            "dev-1",
            &["token:t1".to_string()],
        )
        .await
        .expect("put multi mapping");
    store
        .put_multi_mapping(MultiRelation::DeviceTokens, "dev-1", &[])
        .await
        .expect("put empty set");

    assert!(
        store
            .get_multi_mapping(MultiRelation::DeviceTokens, "dev-1")
            .await
            .expect("get")
            .is_none()
    );
    // The row itself is gone, not just emptied.
    assert!(
        store
            .get("device_tokens:dev-1")
            .await
            .expect("raw get")
            .is_none()
    );
}

#[tokio::test]
async fn test_add_to_multi_mapping_is_idempotent() {
    let store = test_store().await;

    store
        .add_to_multi_mapping(MultiRelation::SubDevices, "did:example:alice", "device:d1")
        .await
        .expect("add first");
    store
        .add_to_multi_mapping(MultiRelation::SubDevices, "did:example:alice", "device:d1")
        .await
        .expect("add duplicate");
    store
        .add_to_multi_mapping(MultiRelation::SubDevices, "did:example:alice", "device:d2")
        .await
        .expect("add second");

    let targets = store
        .get_multi_mapping(MultiRelation::SubDevices, "did:example:alice")
        .await
        .expect("get")
        .expect("mapping present");
    assert_eq!(targets, vec!["device:d1", "device:d2"]);
}

#[tokio::test]
async fn test_remove_from_multi_mapping_drops_empty_row() {
    let store = test_store().await;

    store
        .put_multi_mapping(
            MultiRelation::DeviceAccounts,
            "dev-1",
            &["account:a1".to_string(), "account:a2".to_string()],
        )
        .await
        .expect("put multi mapping");

    store
        .remove_from_multi_mapping(MultiRelation::DeviceAccounts, "dev-1", "account:a1")
        .await
        .expect("remove member");
    assert_eq!(
        store
            .get_multi_mapping(MultiRelation::DeviceAccounts, "dev-1")
            .await
            .expect("get"),
        Some(vec!["account:a2".to_string()])
    );

    store
        .remove_from_multi_mapping(MultiRelation::DeviceAccounts, "dev-1", "account:a2")
        .await
        .expect("remove last member");
    assert!(
        store
            .get("device_accounts:dev-1")
            .await
            .expect("raw get")
            .is_none()
    );
}

#[tokio::test]
async fn test_replace_in_multi_mapping_is_positional() {
    let store = test_store().await;

    store
        .put_multi_mapping(
            MultiRelation::AccountTokens,
            "did:example:alice",
            &[
                "token:t1".to_string(),
                "token:t2".to_string(),
                "token:t3".to_string(),
            ],
        )
        .await
        .expect("put multi mapping");

    store
        .replace_in_multi_mapping(
            MultiRelation::AccountTokens,
            "did:example:alice",
            "token:t2",
            "token:t9",
        )
        .await
        .expect("replace member");

    let targets = store
        .get_multi_mapping(MultiRelation::AccountTokens, "did:example:alice")
        .await
        .expect("get")
        .expect("mapping present");
    assert_eq!(targets, vec!["token:t1", "token:t9", "token:t3"]);
}

#[tokio::test]
async fn test_replace_in_multi_mapping_appends_when_old_absent() {
    let store = test_store().await;

    store
        .put_multi_mapping(
            MultiRelation::AccountTokens,
            "did:example:alice",
            &["token:t1".to_string()],
        )
        .await
        .expect("put multi mapping");

    store
        .replace_in_multi_mapping(
            MultiRelation::AccountTokens,
            "did:example:alice",
            "token:ghost",
            "token:t2",
        )
        .await
        .expect("replace absent member");

    let targets = store
        .get_multi_mapping(MultiRelation::AccountTokens, "did:example:alice")
        .await
        .expect("get")
        .expect("mapping present");
    assert_eq!(targets, vec!["token:t1", "token:t2"]);
}

#[tokio::test]
async fn test_multi_mapping_rejects_corrupt_list() {
    let store = test_store().await;

    // A mapping row whose value is not a JSON list surfaces as corrupt
    // data instead of being silently skipped.
    store
        .put("account_tokens:broken", "mapping_account_tokens", "not json", None)
        .await
        .expect("put corrupt row");

    let err = store
        .get_multi_mapping(MultiRelation::AccountTokens, "broken")
        .await
        .expect_err("corrupt list must not decode");
    assert!(matches!(err, StorageError::CorruptData { .. }));
}

// =============================================================================
// Transactional Scope
// =============================================================================

#[tokio::test]
async fn test_transaction_commit_applies_writes() {
    let store = test_store().await;

    let mut tx = store.begin().await.expect("begin");
    tx.put("probe:p1", "probe", "committed", None)
        .await
        .expect("put in scope");
    tx.put_mapping(SingleRelation::RefreshToken, "rt-1", "probe:p1")
        .await
        .expect("mapping in scope");

    // The scope sees its own writes before commit.
    let row = tx
        .get("probe:p1")
        .await
        .expect("get in scope")
        .expect("visible inside scope");
    assert_eq!(row.value, "committed");

    tx.commit().await.expect("commit");

    assert!(store.get("probe:p1").await.expect("get").is_some());
    assert!(
        store
            .get_mapping(SingleRelation::RefreshToken, "rt-1")
            .await
            .expect("get mapping")
            .is_some()
    );
}

#[tokio::test]
async fn test_transaction_rollback_discards_writes() {
    let store = test_store().await;

    let mut tx = store.begin().await.expect("begin");
    tx.put("probe:p1", "probe", "doomed", None)
        .await
        .expect("put in scope");
    tx.rollback().await.expect("rollback");

    assert!(store.get("probe:p1").await.expect("get").is_none());
}

#[tokio::test]
async fn test_transaction_drop_rolls_back() {
    let store = test_store().await;

    {
        let mut tx = store.begin().await.expect("begin");
        tx.put("probe:p1", "probe", "doomed", None)
            .await
            .expect("put in scope");
        // Dropped without commit.
    }

    assert!(store.get("probe:p1").await.expect("get").is_none());
}

#[tokio::test]
async fn test_transaction_remove_cascade_rolls_back_too() {
    let store = test_store().await;

    store
        .put("token:t1", "token", "{}", None)
        .await
        .expect("put row");
    store
        .put_mapping(SingleRelation::RefreshToken, "rt-1", "token:t1")
        .await
        .expect("install mapping");

    let mut tx = store.begin().await.expect("begin");
    tx.remove("token:t1").await.expect("remove in scope");
    tx.rollback().await.expect("rollback");

    // Row and cascaded mapping both survive the abandoned scope.
    assert!(store.get("token:t1").await.expect("get").is_some());
    assert!(
        store
            .get_mapping(SingleRelation::RefreshToken, "rt-1")
            .await
            .expect("get mapping")
            .is_some()
    );
}
