//! API server configuration.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use gtd_core::auth::tokenizer::TokenSecrets;
use gtd_proxy::remote::breaker::BreakerConfig;
use gtd_proxy::remote::http::{RemoteEndpoint, RetryPolicy};
use gtd_proxy::remote::limit::RateLimitConfig;
use gtd_proxy::remote::transport::ClientGuards;
use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("ACCESS_SECRET and REFRESH_SECRET must differ")]
    SameSecrets,
}

/// Configuration shared by the auth, user and task services.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8081").
    pub bind_addr: String,
    pub access_secret: Option<String>,
    pub refresh_secret: Option<String>,
    /// Deadline applied to every inbound request.
    pub request_timeout: Duration,
    /// Token store backend; `None` selects the in-memory store.
    pub redis_url: Option<String>,
    pub user_service_urls: Vec<Url>,
    pub auth_service_urls: Vec<Url>,
    /// Upstream of the gateway's `/task/v1` routes.
    pub task_service_urls: Vec<Url>,
    pub retry: RetryPolicy,
    /// Circuit breaker and rate limit applied to each remote instance.
    pub guards: ClientGuards,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable               | Default          |
    /// |------------------------|------------------|
    /// | `BIND_ADDR`            | `127.0.0.1:8081` |
    /// | `ACCESS_SECRET`        | (auth, task)     |
    /// | `REFRESH_SECRET`       | (auth)           |
    /// | `REQUEST_TIMEOUT_MS`   | `5000`           |
    /// | `REDIS_URL`            | in-memory store  |
    /// | `USER_SERVICE_URLS`    | empty            |
    /// | `AUTH_SERVICE_URLS`    | empty            |
    /// | `TASK_SERVICE_URLS`    | empty            |
    /// | `RETRY_MAX`            | `3`              |
    /// | `RETRY_TIMEOUT_MS`     | `500`            |
    /// | `BREAKER_FAILURES`     | `5`              |
    /// | `BREAKER_OPEN_MS`      | `30000`          |
    /// | `RATE_LIMIT_BURST`     | `100`            |
    /// | `RATE_LIMIT_REFILL_MS` | `1000`           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = RetryPolicy::default();
        let breaker = BreakerConfig::default();
        let rate_limit = RateLimitConfig::default();

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8081".into()),
            access_secret: non_empty("ACCESS_SECRET"),
            refresh_secret: non_empty("REFRESH_SECRET"),
            request_timeout: millis(&non_empty, "REQUEST_TIMEOUT_MS", 5000)?,
            redis_url: non_empty("REDIS_URL"),
            user_service_urls: urls(&non_empty, "USER_SERVICE_URLS")?,
            auth_service_urls: urls(&non_empty, "AUTH_SERVICE_URLS")?,
            task_service_urls: urls(&non_empty, "TASK_SERVICE_URLS")?,
            retry: RetryPolicy {
                max_attempts: number(&non_empty, "RETRY_MAX", defaults.max_attempts)?,
                attempt_timeout: millis(&non_empty, "RETRY_TIMEOUT_MS", 500)?,
                backoff: defaults.backoff,
            },
            guards: ClientGuards {
                breaker: BreakerConfig {
                    failure_threshold: number(
                        &non_empty,
                        "BREAKER_FAILURES",
                        breaker.failure_threshold,
                    )?,
                    open_for: millis(&non_empty, "BREAKER_OPEN_MS", 30_000)?,
                },
                rate_limit: RateLimitConfig {
                    burst: number(&non_empty, "RATE_LIMIT_BURST", rate_limit.burst)?,
                    refill_every: millis(&non_empty, "RATE_LIMIT_REFILL_MS", 1000)?,
                },
            },
        })
    }

    /// Both signing secrets, checked for presence and distinctness.
    pub fn secrets(&self) -> Result<TokenSecrets, ConfigError> {
        let access_secret = self.access_secret()?.to_string();
        let refresh_secret = self
            .refresh_secret
            .clone()
            .ok_or(ConfigError::Missing("REFRESH_SECRET"))?;
        if access_secret == refresh_secret {
            return Err(ConfigError::SameSecrets);
        }
        Ok(TokenSecrets {
            access_secret,
            refresh_secret,
        })
    }

    /// The access-token secret alone, for services that only verify access
    /// tokens.
    pub fn access_secret(&self) -> Result<&str, ConfigError> {
        self.access_secret
            .as_deref()
            .ok_or(ConfigError::Missing("ACCESS_SECRET"))
    }

    /// Endpoint over the configured user service instances.
    pub fn user_endpoint(&self) -> Result<RemoteEndpoint, ConfigError> {
        self.endpoint(&self.user_service_urls, "USER_SERVICE_URLS")
    }

    /// Endpoint over the configured auth service instances.
    pub fn auth_endpoint(&self) -> Result<RemoteEndpoint, ConfigError> {
        self.endpoint(&self.auth_service_urls, "AUTH_SERVICE_URLS")
    }

    /// Endpoint over the configured task service instances.
    pub fn task_endpoint(&self) -> Result<RemoteEndpoint, ConfigError> {
        self.endpoint(&self.task_service_urls, "TASK_SERVICE_URLS")
    }

    fn endpoint(&self, urls: &[Url], var: &'static str) -> Result<RemoteEndpoint, ConfigError> {
        if urls.is_empty() {
            return Err(ConfigError::Missing(var));
        }
        RemoteEndpoint::with_guards(urls.to_vec(), self.retry.clone(), self.guards.clone())
            .map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            })
    }
}

fn number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    number::<u64>(lookup, var, default).map(Duration::from_millis)
}

fn urls(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Vec<Url>, ConfigError> {
    match lookup(var) {
        None => Ok(Vec::new()),
        Some(raw) => RemoteEndpoint::parse_instances(&raw).map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}
