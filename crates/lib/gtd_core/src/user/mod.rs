//! User service: credential resolution and existence checks.
//!
//! This is the collaborator the login and protected-operation proxies call
//! out to. Persistence sits behind [`UserRepository`].

pub mod memory;
mod password;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::context::{Interrupted, RequestContext};
use crate::models::user::User;

/// User service errors.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid argument")]
    InvalidArgument,

    /// Unknown user or wrong password; the two are not distinguished.
    #[error("user not found")]
    UserNotFound,

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UserError {
    pub fn code(&self) -> &'static str {
        match self {
            UserError::InvalidArgument => "invalid_argument",
            UserError::UserNotFound => "user_not_found",
            UserError::Cancelled => "cancelled",
            UserError::DeadlineExceeded => "deadline_exceeded",
            UserError::Internal(_) => "internal_error",
        }
    }
}

impl From<Interrupted> for UserError {
    fn from(e: Interrupted) -> Self {
        match e {
            Interrupted::Cancelled => UserError::Cancelled,
            Interrupted::DeadlineExceeded => UserError::DeadlineExceeded,
        }
    }
}

/// User persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, UserError>;
    async fn find(&self, id: u64) -> Result<Option<User>, UserError>;
    /// Insert a new user and return it with its assigned id.
    ///
    /// A taken name is `InvalidArgument`; the check and the insert are one
    /// atomic step.
    async fn create(&self, name: &str, password_hash: &str) -> Result<User, UserError>;
}

#[async_trait]
impl<T: UserRepository + ?Sized> UserRepository for Arc<T> {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, UserError> {
        (**self).find_by_name(name).await
    }

    async fn find(&self, id: u64) -> Result<Option<User>, UserError> {
        (**self).find(id).await
    }

    async fn create(&self, name: &str, password_hash: &str) -> Result<User, UserError> {
        (**self).create(name, password_hash).await
    }
}

#[async_trait]
pub trait UserService: Send + Sync {
    /// Resolve credentials to a user id.
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, UserError>;

    /// `Ok(true)` if the user exists; `UserNotFound` if not.
    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, UserError>;
}

#[async_trait]
impl<T: UserService + ?Sized> UserService for Arc<T> {
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, UserError> {
        (**self).user_id(ctx, username, password).await
    }

    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, UserError> {
        (**self).is_exists(ctx, id).await
    }
}

pub struct BasicUserService<R> {
    users: R,
}

impl<R: UserRepository> BasicUserService<R> {
    pub fn new(users: R) -> Self {
        Self { users }
    }

    /// Create an account, storing a bcrypt hash of `password`.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, UserError> {
        if username.is_empty() || password.is_empty() {
            return Err(UserError::InvalidArgument);
        }
        if self.users.find_by_name(username).await?.is_some() {
            return Err(UserError::InvalidArgument);
        }
        let hash = password::hash(password).await?;
        let user = self.users.create(username, &hash).await?;
        debug!(user_id = user.id, "registered user");
        Ok(user)
    }
}

#[async_trait]
impl<R: UserRepository> UserService for BasicUserService<R> {
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, UserError> {
        if username.is_empty() || password.is_empty() {
            return Err(UserError::InvalidArgument);
        }
        let user = ctx
            .guard(self.users.find_by_name(username))
            .await??
            .ok_or(UserError::UserNotFound)?;

        if !password::verify(password, &user.password_hash).await? {
            return Err(UserError::UserNotFound);
        }
        Ok(user.id)
    }

    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, UserError> {
        if id == 0 {
            return Err(UserError::InvalidArgument);
        }
        match ctx.guard(self.users.find(id)).await?? {
            Some(_) => Ok(true),
            None => Err(UserError::UserNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::memory::MemoryUserRepository;

    async fn service_with_alice() -> (BasicUserService<MemoryUserRepository>, u64) {
        let service = BasicUserService::new(MemoryUserRepository::new());
        let alice = service.register("alice", "correct").await.unwrap();
        (service, alice.id)
    }

    #[tokio::test]
    async fn resolves_valid_credentials() {
        let (service, id) = service_with_alice().await;
        let ctx = RequestContext::new();
        assert_eq!(service.user_id(&ctx, "alice", "correct").await.unwrap(), id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let (service, _) = service_with_alice().await;
        let ctx = RequestContext::new();
        assert!(matches!(
            service.user_id(&ctx, "alice", "wrong").await,
            Err(UserError::UserNotFound)
        ));
        assert!(matches!(
            service.user_id(&ctx, "bob", "correct").await,
            Err(UserError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn empty_credentials_are_invalid() {
        let (service, _) = service_with_alice().await;
        let ctx = RequestContext::new();
        assert!(matches!(
            service.user_id(&ctx, "", "x").await,
            Err(UserError::InvalidArgument)
        ));
        assert!(matches!(
            service.user_id(&ctx, "alice", "").await,
            Err(UserError::InvalidArgument)
        ));
    }

    #[tokio::test]
    async fn existence_check() {
        let (service, id) = service_with_alice().await;
        let ctx = RequestContext::new();
        assert!(service.is_exists(&ctx, id).await.unwrap());
        assert!(matches!(
            service.is_exists(&ctx, id + 100).await,
            Err(UserError::UserNotFound)
        ));
        assert!(matches!(
            service.is_exists(&ctx, 0).await,
            Err(UserError::InvalidArgument)
        ));
    }

    #[tokio::test]
    async fn interrupted_lookups_keep_their_cause() {
        let (service, id) = service_with_alice().await;
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::new().with_cancellation(token);

        let err = service.is_exists(&ctx, id).await.unwrap_err();
        assert!(matches!(err, UserError::Cancelled));
        assert_eq!(err.code(), "cancelled");
        assert!(matches!(
            service.user_id(&ctx, "alice", "correct").await,
            Err(UserError::Cancelled)
        ));
        assert!(matches!(
            UserError::from(Interrupted::DeadlineExceeded),
            UserError::DeadlineExceeded
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_of_one_name_has_one_winner() {
        let service = Arc::new(BasicUserService::new(MemoryUserRepository::new()));
        let attempts = (0..8).map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.register("carol", "pw").await.is_ok() })
        });
        let winners = futures::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|joined| *joined.as_ref().unwrap())
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (service, _) = service_with_alice().await;
        assert!(matches!(
            service.register("alice", "other").await,
            Err(UserError::InvalidArgument)
        ));
    }
}
