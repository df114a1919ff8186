//! Task service, the protected consumer of the authorization pipeline.
//!
//! Every operation takes the [`AuthContext`] established by the proxy; a task
//! is only visible to the user who owns it.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::AuthError;
use crate::context::{AuthContext, Interrupted, RequestContext};
use crate::models::task::{Task, TaskDraft};

/// Task service errors.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid argument")]
    InvalidArgument,

    #[error("task not found")]
    NotFound,

    /// Authorization failed before the operation ran.
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Task repository error: {0}")]
    Repository(String),
}

impl TaskError {
    pub fn code(&self) -> &'static str {
        match self {
            TaskError::InvalidArgument => "invalid_argument",
            TaskError::NotFound => "task_not_found",
            TaskError::Auth(e) => e.code(),
            TaskError::Repository(_) => "repository_error",
        }
    }
}

impl From<Interrupted> for TaskError {
    fn from(e: Interrupted) -> Self {
        TaskError::Auth(e.into())
    }
}

/// Task persistence. Lookups are scoped by owner.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, user_id: u64, draft: TaskDraft) -> Result<Task, TaskError>;
    async fn find_all(&self, user_id: u64) -> Result<Vec<Task>, TaskError>;
    async fn find(&self, user_id: u64, task_id: u64) -> Result<Option<Task>, TaskError>;
    /// Replace the fields of an owned task; `None` if no such task.
    async fn update(
        &self,
        user_id: u64,
        task_id: u64,
        draft: TaskDraft,
    ) -> Result<Option<Task>, TaskError>;
    /// `true` if a task was removed.
    async fn delete(&self, user_id: u64, task_id: u64) -> Result<bool, TaskError>;
}

#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        draft: TaskDraft,
    ) -> Result<Task, TaskError>;

    async fn tasks(&self, ctx: &RequestContext, auth: &AuthContext)
    -> Result<Vec<Task>, TaskError>;

    async fn task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<Task, TaskError>;

    async fn update_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
        draft: TaskDraft,
    ) -> Result<Task, TaskError>;

    async fn delete_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<bool, TaskError>;
}

#[async_trait]
impl<T: TaskService + ?Sized> TaskService for Arc<T> {
    async fn create_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        (**self).create_task(ctx, auth, draft).await
    }

    async fn tasks(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
    ) -> Result<Vec<Task>, TaskError> {
        (**self).tasks(ctx, auth).await
    }

    async fn task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<Task, TaskError> {
        (**self).task(ctx, auth, task_id).await
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        (**self).update_task(ctx, auth, task_id, draft).await
    }

    async fn delete_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<bool, TaskError> {
        (**self).delete_task(ctx, auth, task_id).await
    }
}

pub struct BasicTaskService<R> {
    tasks: R,
}

impl<R: TaskRepository> BasicTaskService<R> {
    pub fn new(tasks: R) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl<R: TaskRepository> TaskService for BasicTaskService<R> {
    async fn create_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        if auth.user_id == 0 || draft.title.is_empty() {
            return Err(TaskError::InvalidArgument);
        }
        ctx.guard(self.tasks.create(auth.user_id, draft)).await?
    }

    async fn tasks(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
    ) -> Result<Vec<Task>, TaskError> {
        if auth.user_id == 0 {
            return Err(TaskError::InvalidArgument);
        }
        ctx.guard(self.tasks.find_all(auth.user_id)).await?
    }

    async fn task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<Task, TaskError> {
        if auth.user_id == 0 || task_id == 0 {
            return Err(TaskError::InvalidArgument);
        }
        ctx.guard(self.tasks.find(auth.user_id, task_id))
            .await??
            .ok_or(TaskError::NotFound)
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        if auth.user_id == 0 || task_id == 0 || draft.title.is_empty() {
            return Err(TaskError::InvalidArgument);
        }
        ctx.guard(self.tasks.update(auth.user_id, task_id, draft))
            .await??
            .ok_or(TaskError::NotFound)
    }

    async fn delete_task(
        &self,
        ctx: &RequestContext,
        auth: &AuthContext,
        task_id: u64,
    ) -> Result<bool, TaskError> {
        if auth.user_id == 0 || task_id == 0 {
            return Err(TaskError::InvalidArgument);
        }
        ctx.guard(self.tasks.delete(auth.user_id, task_id)).await?
    }
}
