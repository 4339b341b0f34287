//! Key composition for the flat store.
//!
//! Entity rows are keyed `<namespace>:<localId>` with the namespace
//! doubling as the row type. Local ids may themselves contain `:`
//! (DIDs do), so decomposition only ever strips the leading namespace.

/// Namespace for token rows.
pub(crate) const TOKEN: &str = "token";
/// Namespace for authorization request rows.
pub(crate) const REQUEST: &str = "request";
/// Namespace for device rows.
pub(crate) const DEVICE: &str = "device";
/// Namespace for account rows.
pub(crate) const ACCOUNT: &str = "account";
/// Namespace for per-account authorized-client rows.
pub(crate) const AUTHORIZED_CLIENT: &str = "authorized_client";

pub(crate) fn entity_key(namespace: &str, local_id: &str) -> String {
    format!("{namespace}:{local_id}")
}

pub(crate) fn token_key(token_id: &str) -> String {
    entity_key(TOKEN, token_id)
}

pub(crate) fn request_key(request_id: &str) -> String {
    entity_key(REQUEST, request_id)
}

pub(crate) fn device_key(device_id: &str) -> String {
    entity_key(DEVICE, device_id)
}

pub(crate) fn account_key(sub: &str) -> String {
    entity_key(ACCOUNT, sub)
}

pub(crate) fn authorized_client_key(sub: &str) -> String {
    entity_key(AUTHORIZED_CLIENT, sub)
}

/// Recovers the local id from an entity key in the given namespace.
///
/// Returns `None` when the key belongs to a different namespace.
pub(crate) fn local_id<'a>(namespace: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix(':'))
}
