//! Per-instance HTTP transport, assembled as a tower stack:
//!
//! ```text
//! circuit breaker  →  rate limiter  →  reqwest
//! ```
//!
//! The two guards reject a request before it leaves the process, which is
//! what lets [`super::http::RemoteEndpoint`] retry those rejections on another
//! instance even for calls that must not run twice.

use std::task::{Context, Poll};

use futures::future::BoxFuture;
use thiserror::Error;
use tower::{Service, ServiceBuilder};

use super::breaker::{BreakerConfig, CircuitBreaker, CircuitBreakerLayer};
use super::limit::{RateLimitConfig, RateLimiter, RateLimiterLayer};

/// Why a request produced no response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Sent (or possibly sent) and failed: connect error, timeout, reset.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("circuit open")]
    CircuitOpen,

    #[error("rate limited")]
    RateLimited,
}

impl TransportError {
    /// True when the request certainly never reached the remote service.
    pub fn is_unsent(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_connect(),
            TransportError::CircuitOpen | TransportError::RateLimited => true,
        }
    }
}

/// Guards applied to each instance of a remote service.
#[derive(Debug, Clone, Default)]
pub struct ClientGuards {
    pub breaker: BreakerConfig,
    pub rate_limit: RateLimitConfig,
}

/// Innermost service: executes a prepared request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Service<reqwest::Request> for HttpTransport {
    type Response = reqwest::Response;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<reqwest::Response, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: reqwest::Request) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move { Ok(client.execute(request).await?) })
    }
}

/// The full per-instance stack.
pub type Transport = CircuitBreaker<RateLimiter<HttpTransport>>;

/// Build a fresh stack; breaker and limiter state are not shared with any
/// other instance.
pub fn transport(client: reqwest::Client, guards: &ClientGuards) -> Transport {
    ServiceBuilder::new()
        .layer(CircuitBreakerLayer::new(guards.breaker.clone()))
        .layer(RateLimiterLayer::new(guards.rate_limit.clone()))
        .service(HttpTransport::new(client))
}
