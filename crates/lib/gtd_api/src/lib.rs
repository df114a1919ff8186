//! # gtd_api
//!
//! HTTP API library for GTD kit services.
//!
//! One router per service. Protected routes verify the bearer token's
//! signature in middleware and hand the typed claims to the handlers; the
//! service behind each router is a full `gtd_proxy` stack, so authorization
//! against the token store and the user service happens there.
//!
//! The gateway router is the single public entry point in front of the auth
//! and task services; it authorizes nothing itself and relays requests to
//! them over `gtd_proxy`'s guarded remote endpoints.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::{any, get, post};
use gtd_core::auth::codec::TokenCodec;
use gtd_core::auth::service::AuthService;
use gtd_core::task::TaskService;
use gtd_core::user::UserService;
use gtd_proxy::Metrics;
use gtd_proxy::remote::http::RemoteEndpoint;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, gateway, metrics, task, user};
use crate::middleware::auth::{require_access_claims, require_refresh_claims};

/// State of the auth service router.
#[derive(Clone, FromRef)]
pub struct AuthState {
    pub service: Arc<dyn AuthService>,
    /// Verifies bearer access tokens (logout).
    #[from_ref(skip)]
    pub access: Arc<TokenCodec>,
    /// Verifies bearer refresh tokens (refresh).
    #[from_ref(skip)]
    pub refresh: Arc<TokenCodec>,
    pub metrics: Arc<Metrics>,
    pub request_timeout: Duration,
}

/// State of the user service router.
#[derive(Clone, FromRef)]
pub struct UserState {
    pub service: Arc<dyn UserService>,
    pub metrics: Arc<Metrics>,
    pub request_timeout: Duration,
}

/// State of the task service router.
#[derive(Clone, FromRef)]
pub struct TaskState {
    pub service: Arc<dyn TaskService>,
    #[from_ref(skip)]
    pub access: Arc<TokenCodec>,
    pub metrics: Arc<Metrics>,
    pub request_timeout: Duration,
}

/// State of the gateway router.
#[derive(Clone)]
pub struct GatewayState {
    pub auth: Arc<RemoteEndpoint>,
    pub task: Arc<RemoteEndpoint>,
    pub request_timeout: Duration,
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Routes of the auth service.
pub fn auth_router(state: AuthState) -> Router {
    let public = Router::new()
        .route("/login", post(auth::login_handler))
        .route("/validate", post(auth::validate_handler))
        .route("/metrics", get(metrics::metrics_handler));

    let with_access = Router::new()
        .route("/logout", post(auth::logout_handler))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state.access),
            require_access_claims,
        ));

    let with_refresh = Router::new()
        .route("/refresh", post(auth::refresh_handler))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state.refresh),
            require_refresh_claims,
        ));

    Router::new()
        .merge(public)
        .merge(with_access)
        .merge(with_refresh)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Routes of the user service.
pub fn user_router(state: UserState) -> Router {
    Router::new()
        .route("/user_id", post(user::user_id_handler))
        .route("/exists", post(user::exists_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Routes of the task service.
pub fn task_router(state: TaskState) -> Router {
    let protected = Router::new()
        .route(
            "/tasks",
            post(task::create_task_handler).get(task::list_tasks_handler),
        )
        .route(
            "/tasks/{id}",
            get(task::get_task_handler)
                .put(task::update_task_handler)
                .delete(task::delete_task_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state.access),
            require_access_claims,
        ));

    Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Routes of the API gateway.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/auth/v1/{*rest}", any(gateway::auth_gateway_handler))
        .route("/task/v1/{*rest}", any(gateway::task_gateway_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}
