//! Gateway handlers: relay `/auth/v1/*` and `/task/v1/*` to the owning
//! service and pass its reply back untouched.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use gtd_core::auth::AuthError;
use gtd_proxy::remote::http::RemoteEndpoint;

use super::request_context;
use crate::GatewayState;
use crate::error::{AppError, AppResult};

/// `ANY /auth/v1/{*rest}`
pub async fn auth_gateway_handler(
    State(state): State<GatewayState>,
    Path(rest): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    relay(&state.auth, &state, method, &rest, &uri, &headers, body).await
}

/// `ANY /task/v1/{*rest}`
pub async fn task_gateway_handler(
    State(state): State<GatewayState>,
    Path(rest): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    relay(&state.task, &state, method, &rest, &uri, &headers, body).await
}

async fn relay(
    upstream: &RemoteEndpoint,
    state: &GatewayState,
    method: Method,
    rest: &str,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let ctx = request_context(state.request_timeout);
    let path = match uri.query() {
        Some(query) => format!("{rest}?{query}"),
        None => rest.to_string(),
    };

    let mut outbound = HeaderMap::new();
    for name in [AUTHORIZATION, CONTENT_TYPE, ACCEPT] {
        if let Some(value) = headers.get(&name) {
            outbound.insert(name, value.clone());
        }
    }

    let reply = upstream.forward(&ctx, method, &path, outbound, body).await?;
    let status = reply.status();
    let content_type = reply.headers().get(CONTENT_TYPE).cloned();
    let bytes = ctx
        .guard(reply.bytes())
        .await
        .map_err(AuthError::from)?
        .map_err(|e| AuthError::Transport(format!("reading upstream reply: {e}")))?;

    let mut response = Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}
