//! Assembly of the services and the gateway from configuration.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use gtd_api::config::ApiConfig;
use gtd_api::{AuthState, GatewayState, TaskState, UserState};
use gtd_core::auth::codec::TokenCodec;
use gtd_core::auth::service::BasicAuthService;
use gtd_core::auth::store::{MemoryTokenStore, RedisTokenStore, TokenStore};
use gtd_core::auth::tokenizer::Tokenizer;
use gtd_core::task::BasicTaskService;
use gtd_core::task::memory::MemoryTaskRepository;
use gtd_core::user::BasicUserService;
use gtd_core::user::memory::MemoryUserRepository;
use gtd_proxy::remote::http::{HttpAuthClient, HttpUserClient};
use gtd_proxy::{Metrics, auth_stack, task_stack, user_stack};
use tracing::info;

type BoxError = Box<dyn Error>;

/// How often expired entries are swept from the in-memory token store.
const STORE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

async fn token_store(config: &ApiConfig) -> Result<Arc<dyn TokenStore>, BoxError> {
    match &config.redis_url {
        Some(url) => {
            info!("using redis token store");
            let store: Arc<dyn TokenStore> = Arc::new(RedisTokenStore::connect(url).await?);
            Ok(store)
        }
        None => {
            info!("using in-memory token store");
            let memory = Arc::new(MemoryTokenStore::new());
            memory.spawn_cleanup_task(STORE_SWEEP_INTERVAL);
            let store: Arc<dyn TokenStore> = memory;
            Ok(store)
        }
    }
}

/// Auth service: token lifecycle, with logins resolved by the user service.
pub async fn auth(config: &ApiConfig) -> Result<Router, BoxError> {
    let tokenizer = Arc::new(Tokenizer::new(&config.secrets()?)?);
    let store = token_store(config).await?;
    let users = Arc::new(HttpUserClient::new(config.user_endpoint()?));
    let metrics = Arc::new(Metrics::new()?);

    let service = auth_stack(
        BasicAuthService::new(Arc::clone(&tokenizer), store),
        users,
        Arc::clone(&metrics),
    );
    Ok(gtd_api::auth_router(AuthState {
        service: Arc::new(service),
        access: tokenizer.access_codec(),
        refresh: tokenizer.refresh_codec(),
        metrics,
        request_timeout: config.request_timeout,
    }))
}

/// User service over an in-memory repository, seeded with `name:password`
/// accounts.
pub async fn user(config: &ApiConfig, seed: &[String]) -> Result<Router, BoxError> {
    let users = BasicUserService::new(MemoryUserRepository::new());
    for entry in seed {
        let (name, password) = entry
            .split_once(':')
            .ok_or_else(|| format!("seed user {entry:?} is not NAME:PASSWORD"))?;
        let user = users.register(name, password).await?;
        info!(user_id = user.id, name, "seeded user");
    }
    let metrics = Arc::new(Metrics::new()?);

    Ok(gtd_api::user_router(UserState {
        service: Arc::new(user_stack(users, Arc::clone(&metrics))),
        metrics,
        request_timeout: config.request_timeout,
    }))
}

/// Task service, authorizing every call against the auth and user services.
pub async fn task(config: &ApiConfig) -> Result<Router, BoxError> {
    let access = Arc::new(TokenCodec::new(config.access_secret()?.as_bytes())?);
    let tokens = Arc::new(HttpAuthClient::new(config.auth_endpoint()?));
    let users = Arc::new(HttpUserClient::new(config.user_endpoint()?));
    let metrics = Arc::new(Metrics::new()?);

    let service = task_stack(
        BasicTaskService::new(MemoryTaskRepository::new()),
        tokens,
        users,
        Arc::clone(&metrics),
    );
    Ok(gtd_api::task_router(TaskState {
        service: Arc::new(service),
        access,
        metrics,
        request_timeout: config.request_timeout,
    }))
}

/// Gateway in front of the auth and task services.
pub fn gateway(config: &ApiConfig) -> Result<Router, BoxError> {
    let auth = Arc::new(config.auth_endpoint()?);
    let task = Arc::new(config.task_endpoint()?);
    info!(
        auth = ?auth.instances(),
        task = ?task.instances(),
        "gateway upstreams"
    );
    Ok(gtd_api::gateway_router(GatewayState {
        auth,
        task,
        request_timeout: config.request_timeout,
    }))
}
