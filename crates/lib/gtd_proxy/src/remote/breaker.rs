//! Circuit breaker for one remote instance.
//!
//! Closed until `failure_threshold` consecutive failures, then open for
//! `open_for`. After that a single trial request is let through (half-open):
//! success closes the circuit, failure opens it again. Failures are transport
//! errors and 5xx replies; a 4xx reply is a healthy service saying no.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::{info, warn};

use super::transport::TransportError;

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub open_for: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { until: Instant },
    HalfOpen { trial_in_flight: bool },
}

/// Shared breaker state.
#[derive(Debug)]
pub struct Breaker {
    config: BreakerConfig,
    state: Mutex<State>,
}

impl Breaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while requests are being turned away.
    pub fn is_open(&self) -> bool {
        match *self.state() {
            State::Open { until } => Instant::now() < until,
            State::HalfOpen { trial_in_flight } => trial_in_flight,
            State::Closed { .. } => false,
        }
    }

    fn admit(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        match *state {
            State::Closed { .. } => Ok(()),
            State::Open { until } if Instant::now() >= until => {
                *state = State::HalfOpen {
                    trial_in_flight: true,
                };
                Ok(())
            }
            State::Open { .. } => Err(TransportError::CircuitOpen),
            State::HalfOpen {
                trial_in_flight: false,
            } => {
                *state = State::HalfOpen {
                    trial_in_flight: true,
                };
                Ok(())
            }
            State::HalfOpen {
                trial_in_flight: true,
            } => Err(TransportError::CircuitOpen),
        }
    }

    fn succeeded(&self) {
        let mut state = self.state();
        if !matches!(*state, State::Closed { .. }) {
            info!("circuit closed");
        }
        *state = State::Closed { failures: 0 };
    }

    fn failed(&self) {
        let mut state = self.state();
        let open = State::Open {
            until: Instant::now() + self.config.open_for,
        };
        *state = match *state {
            State::Closed { failures } if failures + 1 >= self.config.failure_threshold => {
                warn!(failures = failures + 1, "circuit opened");
                open
            }
            State::Closed { failures } => State::Closed {
                failures: failures + 1,
            },
            State::HalfOpen { .. } => {
                warn!("trial request failed; circuit reopened");
                open
            }
            current @ State::Open { .. } => current,
        };
    }

    /// The request ended without telling us anything about the instance.
    fn released(&self) {
        let mut state = self.state();
        if let State::HalfOpen { .. } = *state {
            *state = State::HalfOpen {
                trial_in_flight: false,
            };
        }
    }
}

/// Releases a half-open trial slot if the request is dropped unsettled.
struct Admission {
    breaker: Arc<Breaker>,
    settled: bool,
}

impl Admission {
    fn settle(mut self, outcome: &Result<reqwest::Response, TransportError>) {
        self.settled = true;
        match outcome {
            Ok(response) if response.status().is_server_error() => self.breaker.failed(),
            Ok(_) => self.breaker.succeeded(),
            Err(TransportError::Http(_)) => self.breaker.failed(),
            Err(_) => self.breaker.released(),
        }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.released();
        }
    }
}

/// Layer producing a [`CircuitBreaker`] with its own state.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerLayer {
    config: BreakerConfig,
}

impl CircuitBreakerLayer {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreaker<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreaker {
            inner,
            breaker: Arc::new(Breaker::new(self.config.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker<S> {
    inner: S,
    breaker: Arc<Breaker>,
}

impl<S> CircuitBreaker<S> {
    pub fn breaker(&self) -> &Arc<Breaker> {
        &self.breaker
    }
}

impl<S> Service<reqwest::Request> for CircuitBreaker<S>
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
        if let Err(e) = self.breaker.admit() {
            return Box::pin(async move { Err(e) });
        }
        let admission = Admission {
            breaker: Arc::clone(&self.breaker),
            settled: false,
        };
        let response = self.inner.call(request);
        Box::pin(async move {
            let outcome = response.await;
            admission.settle(&outcome);
            outcome
        })
    }
}
