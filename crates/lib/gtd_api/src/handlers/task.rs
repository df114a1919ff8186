//! Task service handlers. All routes sit behind the access-token middleware.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use gtd_core::auth::claims::AccessClaims;
use gtd_core::context::{AuthContext, RequestContext};
use gtd_core::models::task::TaskDraft;
use gtd_core::models::wire::{DeleteTaskResponse, TaskResponse, TasksResponse};

use super::request_context;
use crate::TaskState;
use crate::error::AppResult;

fn principal(state: &TaskState, claims: &AccessClaims) -> (RequestContext, AuthContext) {
    let auth = AuthContext::from(claims);
    let ctx = request_context(state.request_timeout).with_auth(auth.clone());
    (ctx, auth)
}

/// `POST /tasks`
pub async fn create_task_handler(
    State(state): State<TaskState>,
    Extension(claims): Extension<AccessClaims>,
    Json(draft): Json<TaskDraft>,
) -> AppResult<Json<TaskResponse>> {
    let (ctx, auth) = principal(&state, &claims);
    let task = state.service.create_task(&ctx, &auth, draft).await?;
    Ok(Json(TaskResponse { task }))
}

/// `GET /tasks`
pub async fn list_tasks_handler(
    State(state): State<TaskState>,
    Extension(claims): Extension<AccessClaims>,
) -> AppResult<Json<TasksResponse>> {
    let (ctx, auth) = principal(&state, &claims);
    let tasks = state.service.tasks(&ctx, &auth).await?;
    Ok(Json(TasksResponse { tasks }))
}

/// `GET /tasks/{id}`
pub async fn get_task_handler(
    State(state): State<TaskState>,
    Extension(claims): Extension<AccessClaims>,
    Path(id): Path<u64>,
) -> AppResult<Json<TaskResponse>> {
    let (ctx, auth) = principal(&state, &claims);
    let task = state.service.task(&ctx, &auth, id).await?;
    Ok(Json(TaskResponse { task }))
}

/// `PUT /tasks/{id}`
pub async fn update_task_handler(
    State(state): State<TaskState>,
    Extension(claims): Extension<AccessClaims>,
    Path(id): Path<u64>,
    Json(draft): Json<TaskDraft>,
) -> AppResult<Json<TaskResponse>> {
    let (ctx, auth) = principal(&state, &claims);
    let task = state.service.update_task(&ctx, &auth, id, draft).await?;
    Ok(Json(TaskResponse { task }))
}

/// `DELETE /tasks/{id}`
pub async fn delete_task_handler(
    State(state): State<TaskState>,
    Extension(claims): Extension<AccessClaims>,
    Path(id): Path<u64>,
) -> AppResult<Json<DeleteTaskResponse>> {
    let (ctx, auth) = principal(&state, &claims);
    let result = state.service.delete_task(&ctx, &auth, id).await?;
    Ok(Json(DeleteTaskResponse { result }))
}
