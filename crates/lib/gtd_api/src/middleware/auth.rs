//! Authentication middleware: Bearer token extraction and signature check.
//!
//! This is the transport step of the pipeline. A token that verifies has its
//! typed claims placed in request extensions; handlers turn them into the
//! request context. Whether the token is still active is left to the proxies.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use gtd_core::auth::AuthError;
use gtd_core::auth::claims::{AccessClaims, RefreshClaims};
use gtd_core::auth::codec::TokenCodec;
use serde::de::DeserializeOwned;

use crate::error::AppError;

fn bearer(request: &Request) -> Result<&str, AppError> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Auth(AuthError::ClaimsMissing))
}

async fn require_claims<C>(codec: &TokenCodec, mut request: Request, next: Next) -> Result<Response, AppError>
where
    C: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let claims: C = codec.verify(bearer(&request)?)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Verifies `Authorization: Bearer <access token>` and injects [`AccessClaims`].
pub async fn require_access_claims(
    State(codec): State<Arc<TokenCodec>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_claims::<AccessClaims>(&codec, request, next).await
}

/// Verifies `Authorization: Bearer <refresh token>` and injects [`RefreshClaims`].
pub async fn require_refresh_claims(
    State(codec): State<Arc<TokenCodec>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_claims::<RefreshClaims>(&codec, request, next).await
}
