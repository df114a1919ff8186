//! Client-side rate limiter: a token bucket that rejects instead of waiting.

use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;
use tower::{Layer, Service};

use super::transport::TransportError;

/// `burst` requests at once, refilled by one every `refill_every`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub burst: u32,
    pub refill_every: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 100,
            refill_every: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    refilled_at: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: config.burst,
                refilled_at: Instant::now(),
            }),
            config,
        }
    }

    /// Take one token, or fail with `RateLimited`.
    pub fn try_acquire(&self) -> Result<(), TransportError> {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let period = self.config.refill_every.as_nanos().max(1);
        let earned = (now - bucket.refilled_at).as_nanos() / period;
        let missing = self.config.burst - bucket.tokens;

        if earned >= u128::from(missing) {
            bucket.tokens = self.config.burst;
            bucket.refilled_at = now;
        } else if earned > 0 {
            // `earned < missing <= u32::MAX` here.
            let earned = earned as u32;
            bucket.tokens += earned;
            bucket.refilled_at += self.config.refill_every * earned;
        }

        if bucket.tokens == 0 {
            return Err(TransportError::RateLimited);
        }
        bucket.tokens -= 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RateLimiterLayer {
    config: RateLimitConfig,
}

impl RateLimiterLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiter {
            inner,
            bucket: Arc::new(TokenBucket::new(self.config.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter<S> {
    inner: S,
    bucket: Arc<TokenBucket>,
}

impl<S> Service<reqwest::Request> for RateLimiter<S>
where
    S: Service<reqwest::Request, Response = reqwest::Response, Error = TransportError>,
    S::Future: Send + 'static,
{
    type Response = reqwest::Response;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<reqwest::Response, TransportError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: reqwest::Request) -> Self::Future {
        if let Err(e) = self.bucket.try_acquire() {
            return Box::pin(async move { Err(e) });
        }
        Box::pin(self.inner.call(request))
    }
}
