//! Collaborators the proxies consult before letting a call through.
//!
//! Each trait has an in-process adapter (service in the same binary, used by
//! tests and single-process setups) and an HTTP client (sibling service over
//! the network, see [`http`]).

pub mod breaker;
pub mod http;
pub mod limit;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use gtd_core::auth::AuthError;
use gtd_core::auth::service::AuthService;
use gtd_core::context::RequestContext;
use gtd_core::user::UserService;

/// "Is this access token id still active?"
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError>;
}

/// Credential resolution and user existence.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, AuthError>;

    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, AuthError>;
}

#[async_trait]
impl<T: TokenValidator + ?Sized> TokenValidator for Arc<T> {
    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        (**self).validate(ctx, access_uuid).await
    }
}

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, AuthError> {
        (**self).user_id(ctx, username, password).await
    }

    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, AuthError> {
        (**self).is_exists(ctx, id).await
    }
}

/// Validates against an auth service in the same process.
pub struct LocalTokenValidator<S>(pub S);

#[async_trait]
impl<S: AuthService> TokenValidator for LocalTokenValidator<S> {
    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        self.0.validate(ctx, access_uuid).await
    }
}

/// Resolves users against a user service in the same process.
pub struct LocalUserDirectory<U>(pub U);

#[async_trait]
impl<U: UserService> UserDirectory for LocalUserDirectory<U> {
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, AuthError> {
        Ok(self.0.user_id(ctx, username, password).await?)
    }

    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, AuthError> {
        Ok(self.0.is_exists(ctx, id).await?)
    }
}
