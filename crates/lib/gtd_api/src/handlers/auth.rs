//! Auth service handlers.

use axum::extract::State;
use axum::{Extension, Json};
use gtd_core::auth::claims::{AccessClaims, RefreshClaims};
use gtd_core::context::AuthContext;
use gtd_core::models::wire::{
    Credentials, LogoutResponse, TokensResponse, ValidateRequest, ValidateResponse,
};

use super::request_context;
use crate::AuthState;
use crate::error::AppResult;

/// `POST /login`: resolve credentials and issue a token pair.
pub async fn login_handler(
    State(state): State<AuthState>,
    Json(body): Json<Credentials>,
) -> AppResult<Json<TokensResponse>> {
    let ctx = request_context(state.request_timeout);
    let tokens = state
        .service
        .login(&ctx, &body.username, &body.password)
        .await?;
    Ok(Json(TokensResponse { tokens }))
}

/// `POST /logout`: revoke the pair behind the bearer access token.
pub async fn logout_handler(
    State(state): State<AuthState>,
    Extension(claims): Extension<AccessClaims>,
) -> AppResult<Json<LogoutResponse>> {
    let ctx = request_context(state.request_timeout).with_auth(AuthContext::from(&claims));
    let success = state.service.logout(&ctx, &claims.uuid).await?;
    Ok(Json(LogoutResponse { success }))
}

/// `POST /refresh`: redeem the bearer refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<AuthState>,
    Extension(claims): Extension<RefreshClaims>,
) -> AppResult<Json<TokensResponse>> {
    let ctx = request_context(state.request_timeout);
    let tokens = state
        .service
        .refresh(
            &ctx,
            &claims.access_uuid,
            &claims.refresh_uuid,
            claims.user_id,
        )
        .await?;
    Ok(Json(TokensResponse { tokens }))
}

/// `POST /validate`: is this access token id active?
pub async fn validate_handler(
    State(state): State<AuthState>,
    Json(body): Json<ValidateRequest>,
) -> AppResult<Json<ValidateResponse>> {
    let ctx = request_context(state.request_timeout);
    let valid = state.service.validate(&ctx, &body.access_uuid).await?;
    Ok(Json(ValidateResponse { valid }))
}
