//! Mapping index: typed secondary lookups over the flat store.
//!
//! A mapping row is keyed `<relation>:<lookupKey>` with row type
//! `mapping_<relation>`. Single-valued relations store the target key
//! as a plain string; multi-valued relations store a JSON list of
//! target keys, deduplicated and order-preserving. Targets are always
//! full entity keys (`token:t1`), never bare ids.
//!
//! Cardinality is part of a relation's type: [`SingleRelation`] and
//! [`MultiRelation`] are separate enums consumed by separate operation
//! families, so a relation can never be written with the wrong shape
//! and unknown relation names are unrepresentable.
//!
//! Mapping rows carry no expiry. When the sweep removes an expired
//! target, mappings to it dangle until their own retirement path runs;
//! readers tolerate this because every indirection re-resolves its
//! target and treats a miss as absent.

use indexmap::IndexSet;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_sqlite::SqliteConnection;

use crate::error::{Result, StorageError};
use crate::row;

// =============================================================================
// Relation registry
// =============================================================================

/// Relations whose value is exactly one target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SingleRelation {
    /// Current refresh token of a token.
    RefreshToken,
    /// Authorization code a token was minted from.
    AuthorizationCode,
    /// Device a token is bound to.
    TokenDevice,
    /// Authorization code of a pending request.
    AuthorizationCodeRequests,
    /// Pending request opened on a device.
    DeviceRequests,
    /// Account handle alias.
    AccountHandle,
    /// Account email alias.
    AccountEmail,
}

impl SingleRelation {
    /// Wire name of the relation, as persisted in keys and row types.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RefreshToken => "refresh_token",
            Self::AuthorizationCode => "authorization_code",
            Self::TokenDevice => "token_device",
            Self::AuthorizationCodeRequests => "authorization_code_requests",
            Self::DeviceRequests => "device_requests",
            Self::AccountHandle => "account_handle",
            Self::AccountEmail => "account_email",
        }
    }

    /// Composes the mapping row key for a lookup value.
    #[must_use]
    pub fn key(self, lookup: &str) -> String {
        format!("{}:{lookup}", self.name())
    }

    /// Row type tag for this relation.
    #[must_use]
    pub fn row_type(self) -> String {
        format!("mapping_{}", self.name())
    }
}

/// Relations whose value is an ordered set of target keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiRelation {
    /// Tokens owned by a subject.
    AccountTokens,
    /// Tokens bound to a device.
    DeviceTokens,
    /// Accounts signed in on a device.
    DeviceAccounts,
    /// Devices a subject is signed in on.
    SubDevices,
}

impl MultiRelation {
    /// Wire name of the relation, as persisted in keys and row types.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AccountTokens => "account_tokens",
            Self::DeviceTokens => "device_tokens",
            Self::DeviceAccounts => "device_accounts",
            Self::SubDevices => "sub_devices",
        }
    }

    /// Composes the mapping row key for a lookup value.
    #[must_use]
    pub fn key(self, lookup: &str) -> String {
        format!("{}:{lookup}", self.name())
    }

    /// Row type tag for this relation.
    #[must_use]
    pub fn row_type(self) -> String {
        format!("mapping_{}", self.name())
    }
}

// =============================================================================
// Single-valued operations
// =============================================================================

pub(crate) async fn put_mapping(
    conn: &mut SqliteConnection,
    relation: SingleRelation,
    lookup: &str,
    target_key: &str,
) -> Result<()> {
    row::put(
        conn,
        &relation.key(lookup),
        &relation.row_type(),
        target_key,
        None,
    )
    .await
}

pub(crate) async fn get_mapping(
    conn: &mut SqliteConnection,
    relation: SingleRelation,
    lookup: &str,
) -> Result<Option<String>> {
    Ok(row::get(conn, &relation.key(lookup))
        .await?
        .map(|row| row.value))
}

pub(crate) async fn remove_mapping(
    conn: &mut SqliteConnection,
    relation: SingleRelation,
    lookup: &str,
) -> Result<Option<String>> {
    // Mapping rows are never mapping targets themselves, so a plain
    // delete suffices; the reverse-mapping cascade only runs for
    // entity rows.
    let removed: Option<(String,)> = query_as(
        r#"
        DELETE FROM store
        WHERE key = $1
        RETURNING value
        "#,
    )
    .bind(relation.key(lookup))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(removed.map(|(value,)| value))
}

/// Deletes every mapping row of `relation` whose target is `target_key`.
pub(crate) async fn remove_mappings_targeting(
    conn: &mut SqliteConnection,
    relation: SingleRelation,
    target_key: &str,
) -> Result<u64> {
    let result = query(
        r#"
        DELETE FROM store
        WHERE type = $1
          AND value = $2
        "#,
    )
    .bind(relation.row_type())
    .bind(target_key)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Multi-valued operations
// =============================================================================

pub(crate) async fn put_multi_mapping(
    conn: &mut SqliteConnection,
    relation: MultiRelation,
    lookup: &str,
    target_keys: &[String],
) -> Result<()> {
    let targets: IndexSet<&str> = target_keys.iter().map(String::as_str).collect();
    if targets.is_empty() {
        remove_multi_mapping(conn, relation, lookup).await?;
        return Ok(());
    }

    let encoded = serde_json::to_string(&targets)?;
    row::put(
        conn,
        &relation.key(lookup),
        &relation.row_type(),
        &encoded,
        None,
    )
    .await
}

pub(crate) async fn get_multi_mapping(
    conn: &mut SqliteConnection,
    relation: MultiRelation,
    lookup: &str,
) -> Result<Option<Vec<String>>> {
    match row::get(conn, &relation.key(lookup)).await? {
        Some(row) => Ok(Some(row.decode()?)),
        None => Ok(None),
    }
}

pub(crate) async fn remove_multi_mapping(
    conn: &mut SqliteConnection,
    relation: MultiRelation,
    lookup: &str,
) -> Result<Option<Vec<String>>> {
    let key = relation.key(lookup);
    let removed: Option<(String,)> = query_as(
        r#"
        DELETE FROM store
        WHERE key = $1
        RETURNING value
        "#,
    )
    .bind(&key)
    .fetch_optional(&mut *conn)
    .await?;

    removed
        .map(|(value,)| {
            serde_json::from_str(&value)
                .map_err(|e| StorageError::corrupt_data(&key, format!("invalid target list: {e}")))
        })
        .transpose()
}

/// Adds one target key to a multi-valued mapping (set union).
pub(crate) async fn add_to_multi_mapping(
    conn: &mut SqliteConnection,
    relation: MultiRelation,
    lookup: &str,
    target_key: &str,
) -> Result<()> {
    let mut targets = get_multi_mapping(conn, relation, lookup)
        .await?
        .unwrap_or_default();
    if targets.iter().any(|existing| existing == target_key) {
        return Ok(());
    }

    targets.push(target_key.to_string());
    put_multi_mapping(conn, relation, lookup, &targets).await
}

/// Removes one target key from a multi-valued mapping; the row itself
/// is dropped when the set empties.
pub(crate) async fn remove_from_multi_mapping(
    conn: &mut SqliteConnection,
    relation: MultiRelation,
    lookup: &str,
    target_key: &str,
) -> Result<()> {
    let Some(mut targets) = get_multi_mapping(conn, relation, lookup).await? else {
        return Ok(());
    };

    let before = targets.len();
    targets.retain(|existing| existing != target_key);
    if targets.len() == before {
        return Ok(());
    }

    put_multi_mapping(conn, relation, lookup, &targets).await
}

/// Replaces one target key with another, keeping list order. If the
/// old key was not a member, the new one is appended so the set still
/// covers the new target.
pub(crate) async fn replace_in_multi_mapping(
    conn: &mut SqliteConnection,
    relation: MultiRelation,
    lookup: &str,
    old_target: &str,
    new_target: &str,
) -> Result<()> {
    let mut targets = get_multi_mapping(conn, relation, lookup)
        .await?
        .unwrap_or_default();

    let mut replaced = false;
    for target in &mut targets {
        if target == old_target {
            *target = new_target.to_string();
            replaced = true;
        }
    }
    if !replaced {
        targets.push(new_target.to_string());
    }

    put_multi_mapping(conn, relation, lookup, &targets).await
}
