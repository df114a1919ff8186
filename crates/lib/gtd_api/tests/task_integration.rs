//! Integration test: the task router behind the full task stack, with token
//! validity and user existence answered by in-process auth and user stacks.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use gtd_api::{TaskState, task_router};
use gtd_core::auth::service::{AuthService, BasicAuthService, TokenPair};
use gtd_core::auth::store::MemoryTokenStore;
use gtd_core::auth::tokenizer::{TokenSecrets, Tokenizer};
use gtd_core::context::{AuthContext, RequestContext};
use gtd_core::task::BasicTaskService;
use gtd_core::task::memory::MemoryTaskRepository;
use gtd_core::user::BasicUserService;
use gtd_core::user::memory::MemoryUserRepository;
use gtd_proxy::remote::{LocalTokenValidator, LocalUserDirectory};
use gtd_proxy::{Metrics, auth_stack, task_stack, user_stack};
use serde_json::{Value, json};
use tower::ServiceExt;

struct Harness {
    app: Router,
    auth: Arc<dyn AuthService>,
    tokenizer: Arc<Tokenizer>,
}

async fn harness() -> Harness {
    let metrics = Arc::new(Metrics::new().unwrap());
    let users = BasicUserService::new(MemoryUserRepository::new());
    users.register("alice", "correct").await.unwrap();
    users.register("bob", "hunter2").await.unwrap();
    let directory = Arc::new(LocalUserDirectory(user_stack(users, Arc::clone(&metrics))));

    let tokenizer = Arc::new(
        Tokenizer::new(&TokenSecrets {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
        })
        .unwrap(),
    );
    let auth: Arc<dyn AuthService> = Arc::new(auth_stack(
        BasicAuthService::new(Arc::clone(&tokenizer), Arc::new(MemoryTokenStore::new())),
        Arc::clone(&directory),
        Arc::clone(&metrics),
    ));

    let tasks = task_stack(
        BasicTaskService::new(MemoryTaskRepository::new()),
        Arc::new(LocalTokenValidator(Arc::clone(&auth))),
        directory,
        Arc::clone(&metrics),
    );
    let app = task_router(TaskState {
        service: Arc::new(tasks),
        access: tokenizer.access_codec(),
        metrics,
        request_timeout: Duration::from_secs(5),
    });
    Harness {
        app,
        auth,
        tokenizer,
    }
}

async fn login(h: &Harness, username: &str, password: &str) -> TokenPair {
    h.auth
        .login(&RequestContext::new(), username, password)
        .await
        .unwrap()
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(request).await.expect("request");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("parse JSON")
    };
    (status, json)
}

#[tokio::test]
async fn task_crud_for_authenticated_user() {
    let h = harness().await;
    let token = login(&h, "alice", "correct").await.access_token;
    let bearer = Some(token.as_str());

    let (status, body) = call(
        &h.app,
        Method::POST,
        "/tasks",
        bearer,
        Some(json!({"title": "buy milk", "description": "2 litres"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    let id = body["task"]["id"].as_u64().unwrap();
    assert_eq!(body["task"]["done"], false);

    let (status, body) = call(&h.app, Method::GET, "/tasks", bearer, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);

    let (status, body) = call(
        &h.app,
        Method::PUT,
        &format!("/tasks/{id}"),
        bearer,
        Some(json!({"title": "buy milk", "description": "", "done": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["done"], true);

    let (status, body) = call(&h.app, Method::GET, &format!("/tasks/{id}"), bearer, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["title"], "buy milk");

    let (status, body) = call(&h.app, Method::DELETE, &format!("/tasks/{id}"), bearer, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": true}));

    let (status, body) = call(&h.app, Method::GET, &format!("/tasks/{id}"), bearer, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "task_not_found");
}

#[tokio::test]
async fn tasks_are_private_to_their_owner() {
    let h = harness().await;
    let alice = login(&h, "alice", "correct").await.access_token;
    let bob = login(&h, "bob", "hunter2").await.access_token;

    let (_, body) = call(
        &h.app,
        Method::POST,
        "/tasks",
        Some(&alice),
        Some(json!({"title": "secret plan"})),
    )
    .await;
    let id = body["task"]["id"].as_u64().unwrap();

    let (status, _) = call(&h.app, Method::GET, &format!("/tasks/{id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&h.app, Method::GET, "/tasks", Some(&bob), None).await;
    assert_eq!(body["tasks"], json!([]));
}

#[tokio::test]
async fn revoked_token_is_rejected_by_the_task_service() {
    let h = harness().await;
    let token = login(&h, "alice", "correct").await.access_token;
    let claims = h.tokenizer.verify_access(&token).unwrap();

    let ctx = RequestContext::new().with_auth(AuthContext::from(&claims));
    assert!(h.auth.logout(&ctx, &claims.uuid).await.unwrap());

    // The signature still verifies; only the token store knows it is revoked.
    let (status, body) = call(&h.app, Method::GET, "/tasks", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "key_not_found");
}

#[tokio::test]
async fn missing_or_forged_bearer_is_rejected() {
    let h = harness().await;
    let (status, _) = call(&h.app, Method::GET, "/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&h.app, Method::GET, "/tasks", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "malformed_token");
}

#[tokio::test]
async fn empty_title_is_a_bad_request() {
    let h = harness().await;
    let token = login(&h, "alice", "correct").await.access_token;
    let (status, body) = call(
        &h.app,
        Method::POST,
        "/tasks",
        Some(&token),
        Some(json!({"title": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");
}
