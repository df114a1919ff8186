//! Proxy in front of the task service.
//!
//! The task service holds no token state. Before any task operation runs the
//! proxy asks the auth service whether the caller's access token is still
//! active, then asks the user service whether the caller still exists. The
//! first failed check is returned and the operation is never reached.

use async_trait::async_trait;
use gtd_core::auth::AuthError;
use gtd_core::context::{AuthContext, RequestContext};
use gtd_core::models::task::{Task, TaskDraft};
use gtd_core::task::{TaskError, TaskService};
use tower::Layer;

use super::{require_active_token, require_existing_user};
use crate::remote::{TokenValidator, UserDirectory};

#[derive(Debug, Clone)]
pub struct TaskProxyLayer<V, D> {
    tokens: V,
    users: D,
}

impl<V, D> TaskProxyLayer<V, D> {
    pub fn new(tokens: V, users: D) -> Self {
        Self { tokens, users }
    }
}

impl<S, V: Clone, D: Clone> Layer<S> for TaskProxyLayer<V, D> {
    type Service = TaskProxy<S, V, D>;

    fn layer(&self, inner: S) -> Self::Service {
        TaskProxy {
            inner,
            tokens: self.tokens.clone(),
            users: self.users.clone(),
        }
    }
}

pub struct TaskProxy<S, V, D> {
    inner: S,
    tokens: V,
    users: D,
}

impl<S, V: TokenValidator, D: UserDirectory> TaskProxy<S, V, D> {
    async fn authorize(&self, ctx: &RequestContext, auth: &AuthContext) -> Result<(), AuthError> {
        require_active_token(&self.tokens, ctx, &auth.access_uuid).await?;
        require_existing_user(&self.users, ctx, auth.user_id).await?;
        ctx.check()?;
        Ok(())
    }
}

#[async_trait]
impl<S, V, D> TaskService for TaskProxy<S, V, D>
where
    S: TaskService,
    V: TokenValidator,
    D: UserDirectory,
{
    async fn create_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        self.authorize(ctx, auth).await?;
        self.inner.create_task(ctx, auth, draft).await
    }

    async fn tasks(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
    ) -> Result<Vec<Task>, TaskError> {
        self.authorize(ctx, auth).await?;
        self.inner.tasks(ctx, auth).await
    }

    async fn task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<Task, TaskError> {
        self.authorize(ctx, auth).await?;
        self.inner.task(ctx, auth, task_id).await
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        self.authorize(ctx, auth).await?;
        self.inner.update_task(ctx, auth, task_id, draft).await
    }

    async fn delete_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<bool, TaskError> {
        self.authorize(ctx, auth).await?;
        self.inner.delete_task(ctx, auth, task_id).await
    }
}
