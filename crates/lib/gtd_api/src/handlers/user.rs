//! User service handlers.

use axum::Json;
use axum::extract::State;
use gtd_core::models::wire::{Credentials, UserExistsRequest, UserExistsResponse, UserIdResponse};

use super::request_context;
use crate::UserState;
use crate::error::AppResult;

/// `POST /user_id`: resolve credentials to a user id.
pub async fn user_id_handler(
    State(state): State<UserState>,
    Json(body): Json<Credentials>,
) -> AppResult<Json<UserIdResponse>> {
    let ctx = request_context(state.request_timeout);
    let id = state
        .service
        .user_id(&ctx, &body.username, &body.password)
        .await?;
    Ok(Json(UserIdResponse { id }))
}

/// `POST /exists`
pub async fn exists_handler(
    State(state): State<UserState>,
    Json(body): Json<UserExistsRequest>,
) -> AppResult<Json<UserExistsResponse>> {
    let ctx = request_context(state.request_timeout);
    let exists = state.service.is_exists(&ctx, body.id).await?;
    Ok(Json(UserExistsResponse { exists }))
}
