//! Instrumentation decorator: counts calls and measures latency.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use gtd_core::auth::AuthError;
use gtd_core::auth::service::{AuthService, TokenPair};
use gtd_core::context::{AuthContext, RequestContext};
use gtd_core::models::task::{Task, TaskDraft};
use gtd_core::task::{TaskError, TaskService};
use gtd_core::user::{UserError, UserService};
use tower::Layer;

use crate::metrics::Metrics;

/// Errors with a stable code usable as a metric label.
pub(crate) trait ErrorCode {
    fn code(&self) -> &'static str;
}

impl ErrorCode for AuthError {
    fn code(&self) -> &'static str {
        AuthError::code(self)
    }
}

impl ErrorCode for TaskError {
    fn code(&self) -> &'static str {
        TaskError::code(self)
    }
}

impl ErrorCode for UserError {
    fn code(&self) -> &'static str {
        UserError::code(self)
    }
}

/// Wraps a service in [`Instrumented`].
#[derive(Debug, Clone)]
pub struct InstrumentingLayer {
    metrics: Arc<Metrics>,
    service: &'static str,
}

impl InstrumentingLayer {
    pub fn new(metrics: Arc<Metrics>, service: &'static str) -> Self {
        Self { metrics, service }
    }
}

impl<S> Layer<S> for InstrumentingLayer {
    type Service = Instrumented<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Instrumented {
            inner,
            metrics: Arc::clone(&self.metrics),
            service: self.service,
        }
    }
}

pub struct Instrumented<S> {
    inner: S,
    metrics: Arc<Metrics>,
    service: &'static str,
}

impl<S> Instrumented<S> {
    fn observe<T, E: ErrorCode>(&self, method: &str, started: Instant, result: &Result<T, E>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        self.metrics
            .record(self.service, method, outcome, started.elapsed());
    }
}

#[async_trait]
impl<S: AuthService> AuthService for Instrumented<S> {
    async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        let started = Instant::now();
        let result = self.inner.login(ctx, username, password).await;
        self.observe("login", started, &result);
        result
    }

    async fn logout(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        let started = Instant::now();
        let result = self.inner.logout(ctx, access_uuid).await;
        self.observe("logout", started, &result);
        result
    }

    async fn refresh(
        &self,
        ctx: &RequestContext,
        access_uuid: &str,
        refresh_uuid: &str,
        user_id: u64,
    ) -> Result<TokenPair, AuthError> {
        let started = Instant::now();
        let result = self
            .inner
            .refresh(ctx, access_uuid, refresh_uuid, user_id)
            .await;
        self.observe("refresh", started, &result);
        result
    }

    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        let started = Instant::now();
        let result = self.inner.validate(ctx, access_uuid).await;
        self.observe("validate", started, &result);
        result
    }
}

#[async_trait]
impl<S: TaskService> TaskService for Instrumented<S> {
    async fn create_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        let started = Instant::now();
        let result = self.inner.create_task(ctx, auth, draft).await;
        self.observe("create_task", started, &result);
        result
    }

    async fn tasks(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
    ) -> Result<Vec<Task>, TaskError> {
        let started = Instant::now();
        let result = self.inner.tasks(ctx, auth).await;
        self.observe("tasks", started, &result);
        result
    }

    async fn task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<Task, TaskError> {
        let started = Instant::now();
        let result = self.inner.task(ctx, auth, task_id).await;
        self.observe("task", started, &result);
        result
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        let started = Instant::now();
        let result = self.inner.update_task(ctx, auth, task_id, draft).await;
        self.observe("update_task", started, &result);
        result
    }

    async fn delete_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<bool, TaskError> {
        let started = Instant::now();
        let result = self.inner.delete_task(ctx, auth, task_id).await;
        self.observe("delete_task", started, &result);
        result
    }
}

#[async_trait]
impl<S: UserService> UserService for Instrumented<S> {
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, UserError> {
        let started = Instant::now();
        let result = self.inner.user_id(ctx, username, password).await;
        self.observe("user_id", started, &result);
        result
    }

    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, UserError> {
        let started = Instant::now();
        let result = self.inner.is_exists(ctx, id).await;
        self.observe("is_exists", started, &result);
        result
    }
}
