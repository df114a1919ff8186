//! Integration test: user router over a repository that never answers, so
//! the request deadline is what ends the call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use gtd_api::{UserState, user_router};
use gtd_core::models::user::User;
use gtd_core::user::{BasicUserService, UserError, UserRepository};
use gtd_proxy::{Metrics, user_stack};
use serde_json::{Value, json};
use tower::ServiceExt;

/// Every lookup hangs.
struct StalledRepository;

#[async_trait]
impl UserRepository for StalledRepository {
    async fn find_by_name(&self, _name: &str) -> Result<Option<User>, UserError> {
        std::future::pending().await
    }

    async fn find(&self, _id: u64) -> Result<Option<User>, UserError> {
        std::future::pending().await
    }

    async fn create(&self, _name: &str, _password_hash: &str) -> Result<User, UserError> {
        std::future::pending().await
    }
}

async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
    let metrics = Arc::new(Metrics::new().unwrap());
    let app = user_router(UserState {
        service: Arc::new(user_stack(
            BasicUserService::new(StalledRepository),
            Arc::clone(&metrics),
        )),
        metrics,
        request_timeout: Duration::from_millis(50),
    });

    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(request).await.expect("request");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&body).expect("parse JSON"))
}

#[tokio::test]
async fn expired_deadline_is_a_gateway_timeout() {
    let (status, body) = post("/exists", json!({"id": 7})).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "deadline_exceeded");

    let (status, body) = post("/user_id", json!({"username": "alice", "password": "pw"})).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "deadline_exceeded");
}
