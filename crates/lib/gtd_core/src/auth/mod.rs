//! Token lifecycle: codec, tokenizer, token store and the auth core service.
//!
//! Shared across `gtd_proxy` (which decorates the service) and `gtd_api`
//! (which exposes it over HTTP).

pub mod claims;
pub mod codec;
pub mod service;
pub mod store;
pub mod tokenizer;

use thiserror::Error;

use crate::context::Interrupted;
use crate::user::UserError;
use codec::TokenError;
use store::StoreError;

/// Authentication errors.
///
/// Domain rejections (`InvalidArgument`, `KeyNotFound`, `UserNotFound`,
/// `Claims*`, token verification failures) are kept apart from faults
/// (`Store`, `Transport`, `Internal`) so callers never read "service
/// unreachable" as "credentials invalid".
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid argument")]
    InvalidArgument,

    #[error("key not found")]
    KeyNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("JWT claims was not passed through the context")]
    ClaimsMissing,

    #[error("JWT claims was invalid")]
    ClaimsInvalid,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Token store error: {0}")]
    Store(String),

    #[error("Remote call failed: {0}")]
    Transport(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable code used on the wire between services.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidArgument => "invalid_argument",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::UserNotFound => "user_not_found",
            AuthError::ClaimsMissing => "claims_missing",
            AuthError::ClaimsInvalid => "claims_invalid",
            AuthError::Token(TokenError::Expired) => "token_expired",
            AuthError::Token(TokenError::InvalidSignature) => "invalid_signature",
            AuthError::Token(TokenError::Malformed(_)) => "malformed_token",
            AuthError::Token(TokenError::Signing(_)) => "signature_failure",
            AuthError::Store(_) => "store_unavailable",
            AuthError::Transport(_) => "upstream_unavailable",
            AuthError::Cancelled => "cancelled",
            AuthError::DeadlineExceeded => "deadline_exceeded",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Rebuild an error received from a sibling service.
    ///
    /// A remote store outage stays `Store`; other codes that do not name a
    /// domain rejection collapse into `Transport`, carrying the remote message.
    pub fn from_wire(code: &str, message: &str) -> Self {
        match code {
            "invalid_argument" => AuthError::InvalidArgument,
            "key_not_found" => AuthError::KeyNotFound,
            "user_not_found" => AuthError::UserNotFound,
            "claims_missing" => AuthError::ClaimsMissing,
            "claims_invalid" => AuthError::ClaimsInvalid,
            "token_expired" => AuthError::Token(TokenError::Expired),
            "invalid_signature" => AuthError::Token(TokenError::InvalidSignature),
            "malformed_token" => AuthError::Token(TokenError::Malformed(message.to_string())),
            "store_unavailable" => AuthError::Store(message.to_string()),
            _ => AuthError::Transport(format!("{code}: {message}")),
        }
    }

    /// True when the caller failed to authenticate (as opposed to a fault).
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::KeyNotFound
                | AuthError::UserNotFound
                | AuthError::ClaimsMissing
                | AuthError::ClaimsInvalid
                | AuthError::Token(
                    TokenError::Expired | TokenError::InvalidSignature | TokenError::Malformed(_)
                )
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::KeyNotFound => AuthError::KeyNotFound,
            StoreError::Backend(msg) => AuthError::Store(msg),
        }
    }
}

impl From<UserError> for AuthError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::InvalidArgument => AuthError::InvalidArgument,
            UserError::UserNotFound => AuthError::UserNotFound,
            UserError::Cancelled => AuthError::Cancelled,
            UserError::DeadlineExceeded => AuthError::DeadlineExceeded,
            UserError::Internal(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<Interrupted> for AuthError {
    fn from(e: Interrupted) -> Self {
        match e {
            Interrupted::Cancelled => AuthError::Cancelled,
            Interrupted::DeadlineExceeded => AuthError::DeadlineExceeded,
        }
    }
}
