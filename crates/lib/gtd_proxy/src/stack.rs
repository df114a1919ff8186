//! Service stack builders.
//!
//! Decorator order is fixed here: proxy, then instrumentation, then logging,
//! then the basic service. Authorization failures therefore short-circuit
//! before any metric or call event is recorded for the wrapped operation.

use std::sync::Arc;

use tower::ServiceBuilder;

use crate::instrument::{Instrumented, InstrumentingLayer};
use crate::logging::{Logged, LoggingLayer};
use crate::metrics::Metrics;
use crate::proxy::auth::{AuthProxy, AuthProxyLayer};
use crate::proxy::task::{TaskProxy, TaskProxyLayer};

pub type AuthStack<S, D> = AuthProxy<Instrumented<Logged<S>>, D>;
pub type TaskStack<S, V, D> = TaskProxy<Instrumented<Logged<S>>, V, D>;
pub type UserStack<S> = Instrumented<Logged<S>>;

/// Wrap a basic auth service; `users` resolves logins and checks existence.
pub fn auth_stack<S, D: Clone>(basic: S, users: D, metrics: Arc<Metrics>) -> AuthStack<S, D> {
    ServiceBuilder::new()
        .layer(AuthProxyLayer::new(users))
        .layer(InstrumentingLayer::new(metrics, "auth"))
        .layer(LoggingLayer::new("auth"))
        .service(basic)
}

/// Wrap a basic task service behind remote token and user checks.
pub fn task_stack<S, V: Clone, D: Clone>(
    basic: S,
    tokens: V,
    users: D,
    metrics: Arc<Metrics>,
) -> TaskStack<S, V, D> {
    ServiceBuilder::new()
        .layer(TaskProxyLayer::new(tokens, users))
        .layer(InstrumentingLayer::new(metrics, "task"))
        .layer(LoggingLayer::new("task"))
        .service(basic)
}

/// Wrap a basic user service. The user service authorizes no one, so there is
/// no proxy layer.
pub fn user_stack<S>(basic: S, metrics: Arc<Metrics>) -> UserStack<S> {
    ServiceBuilder::new()
        .layer(InstrumentingLayer::new(metrics, "user"))
        .layer(LoggingLayer::new("user"))
        .service(basic)
}
