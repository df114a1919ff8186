// Token identifiers.
//
// Access token ids are random (v4). The paired refresh token id is a v5
// (SHA-1, namespace based) derivation of the access id, so logout can find
// both store entries from the access id alone.

use uuid::Uuid;

/// Mint a fresh access token id.
pub fn new_access_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Derive the refresh token id paired with `access_uuid`.
///
/// Pure function: the same access id always yields the same refresh id.
pub fn derive_refresh_uuid(access_uuid: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, access_uuid.as_bytes()).to_string()
}
