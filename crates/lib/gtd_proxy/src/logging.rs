//! Logging decorator: one event per call.
//!
//! Identifying arguments are logged (access uuid, user id, task id, username).
//! Passwords and signed token strings never are.

use async_trait::async_trait;
use gtd_core::auth::AuthError;
use gtd_core::auth::service::{AuthService, TokenPair};
use gtd_core::context::{AuthContext, RequestContext};
use gtd_core::models::task::{Task, TaskDraft};
use gtd_core::task::{TaskError, TaskService};
use gtd_core::user::{UserError, UserService};
use tower::Layer;
use tracing::{info, warn};

/// Wraps a service in [`Logged`].
#[derive(Debug, Clone, Copy)]
pub struct LoggingLayer {
    service: &'static str,
}

impl LoggingLayer {
    pub fn new(service: &'static str) -> Self {
        Self { service }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logged<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logged {
            inner,
            service: self.service,
        }
    }
}

pub struct Logged<S> {
    inner: S,
    service: &'static str,
}

/// Emit the call event: `info` on success, `warn` on failure.
macro_rules! log_call {
    ($self:ident, $method:literal, $result:expr, $($field:tt)*) => {
        match &$result {
            Ok(_) => info!(service = $self.service, method = $method, $($field)*, "call succeeded"),
            Err(e) => warn!(service = $self.service, method = $method, $($field)*, error = %e, "call failed"),
        }
    };
}

#[async_trait]
impl<S: AuthService> AuthService for Logged<S> {
    async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        let result = self.inner.login(ctx, username, password).await;
        log_call!(self, "login", result, username, user_id = ?ctx.user_id());
        result
    }

    async fn logout(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        let result = self.inner.logout(ctx, access_uuid).await;
        log_call!(self, "logout", result, access_uuid);
        result
    }

    async fn refresh(
        &self,
        ctx: &RequestContext,
        access_uuid: &str,
        refresh_uuid: &str,
        user_id: u64,
    ) -> Result<TokenPair, AuthError> {
        let result = self
            .inner
            .refresh(ctx, access_uuid, refresh_uuid, user_id)
            .await;
        log_call!(self, "refresh", result, access_uuid, refresh_uuid, user_id);
        result
    }

    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        let result = self.inner.validate(ctx, access_uuid).await;
        log_call!(self, "validate", result, access_uuid);
        result
    }
}

#[async_trait]
impl<S: TaskService> TaskService for Logged<S> {
    async fn create_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        let result = self.inner.create_task(ctx, auth, draft).await;
        log_call!(self, "create_task", result, user_id = auth.user_id);
        result
    }

    async fn tasks(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
    ) -> Result<Vec<Task>, TaskError> {
        let result = self.inner.tasks(ctx, auth).await;
        log_call!(self, "tasks", result, user_id = auth.user_id);
        result
    }

    async fn task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<Task, TaskError> {
        let result = self.inner.task(ctx, auth, task_id).await;
        log_call!(self, "task", result, user_id = auth.user_id, task_id);
        result
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        let result = self.inner.update_task(ctx, auth, task_id, draft).await;
        log_call!(self, "update_task", result, user_id = auth.user_id, task_id);
        result
    }

    async fn delete_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<bool, TaskError> {
        let result = self.inner.delete_task(ctx, auth, task_id).await;
        log_call!(self, "delete_task", result, user_id = auth.user_id, task_id);
        result
    }
}

#[async_trait]
impl<S: UserService> UserService for Logged<S> {
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, UserError> {
        let result = self.inner.user_id(ctx, username, password).await;
        log_call!(self, "user_id", result, username);
        result
    }

    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, UserError> {
        let result = self.inner.is_exists(ctx, id).await;
        log_call!(self, "is_exists", result, user_id = id);
        result
    }
}
