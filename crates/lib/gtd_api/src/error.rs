//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gtd_core::auth::AuthError;
use gtd_core::auth::codec::TokenError;
use gtd_core::models::wire::ErrorResponse;
use gtd_core::task::TaskError;
use gtd_core::user::UserError;
use thiserror::Error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
///
/// Every unauthenticated condition is a 401 whichever check failed; the
/// `error` code is kept so sibling services can rebuild the domain error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    User(#[from] UserError),

    #[error("Internal server error")]
    Internal(String),
}

fn auth_status(e: &AuthError) -> StatusCode {
    match e {
        AuthError::InvalidArgument => StatusCode::BAD_REQUEST,
        e if e.is_unauthenticated() => StatusCode::UNAUTHORIZED,
        AuthError::Store(_) | AuthError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Cancelled | AuthError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Auth(e) => (auth_status(e), e.code()),
            AppError::Task(TaskError::Auth(e)) => (auth_status(e), e.code()),
            AppError::Task(e @ TaskError::InvalidArgument) => (StatusCode::BAD_REQUEST, e.code()),
            AppError::Task(e @ TaskError::NotFound) => (StatusCode::NOT_FOUND, e.code()),
            AppError::Task(e @ TaskError::Repository(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.code())
            }
            AppError::User(e @ UserError::InvalidArgument) => (StatusCode::BAD_REQUEST, e.code()),
            AppError::User(e @ UserError::UserNotFound) => (StatusCode::UNAUTHORIZED, e.code()),
            AppError::User(e @ (UserError::Cancelled | UserError::DeadlineExceeded)) => {
                (StatusCode::GATEWAY_TIMEOUT, e.code())
            }
            AppError::User(e @ UserError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.code())
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.parts();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Auth(AuthError::Token(e))
    }
}
