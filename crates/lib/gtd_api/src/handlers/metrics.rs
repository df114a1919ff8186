use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use gtd_proxy::Metrics;

use crate::error::{AppError, AppResult};

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> AppResult<impl IntoResponse> {
    let body = metrics
        .render()
        .map_err(|e| AppError::Internal(format!("render metrics: {e}")))?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
