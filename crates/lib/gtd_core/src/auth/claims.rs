//! Claim sets carried inside signed tokens.
//!
//! Claims are untrusted until `TokenCodec::verify` has checked the signature
//! and expiry; after that they are authoritative for the current request only.

use serde::{Deserialize, Serialize};

use crate::context::AuthContext;

/// Claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Access token id: the token store key.
    pub uuid: String,
    /// Subject user id.
    pub user_id: u64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Claims embedded in refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Id of the paired access token.
    pub access_uuid: String,
    /// Refresh token id, derived from `access_uuid`.
    pub refresh_uuid: String,
    pub user_id: u64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

impl From<&AccessClaims> for AuthContext {
    fn from(claims: &AccessClaims) -> Self {
        AuthContext {
            access_uuid: claims.uuid.clone(),
            user_id: claims.user_id,
        }
    }
}
