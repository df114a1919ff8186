//! Proxy in front of the auth service.
//!
//! Login resolves credentials through the user service and attaches the user
//! id to the context. Logout and refresh re-check that the claimed user still
//! exists. The token validity check is skipped here because the auth service
//! owns the token store and checks it itself.

use async_trait::async_trait;
use gtd_core::auth::AuthError;
use gtd_core::auth::service::{AuthService, TokenPair};
use gtd_core::context::RequestContext;
use tower::Layer;

use super::require_existing_user;
use crate::remote::UserDirectory;

#[derive(Debug, Clone)]
pub struct AuthProxyLayer<D> {
    users: D,
}

impl<D> AuthProxyLayer<D> {
    pub fn new(users: D) -> Self {
        Self { users }
    }
}

impl<S, D: Clone> Layer<S> for AuthProxyLayer<D> {
    type Service = AuthProxy<S, D>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthProxy {
            inner,
            users: self.users.clone(),
        }
    }
}

pub struct AuthProxy<S, D> {
    inner: S,
    users: D,
}

#[async_trait]
impl<S: AuthService, D: UserDirectory> AuthService for AuthProxy<S, D> {
    async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        let user_id = self.users.user_id(ctx, username, password).await?;
        let ctx = ctx.clone().with_user_id(user_id);
        ctx.check()?;
        self.inner.login(&ctx, username, password).await
    }

    async fn logout(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        let auth = ctx.auth().ok_or(AuthError::ClaimsMissing)?;
        if auth.access_uuid != access_uuid {
            return Err(AuthError::ClaimsInvalid);
        }
        require_existing_user(&self.users, ctx, auth.user_id).await?;
        ctx.check()?;
        self.inner.logout(ctx, access_uuid).await
    }

    async fn refresh(
        &self,
        ctx: &RequestContext,
        access_uuid: &str,
        refresh_uuid: &str,
        user_id: u64,
    ) -> Result<TokenPair, AuthError> {
        require_existing_user(&self.users, ctx, user_id).await?;
        ctx.check()?;
        self.inner
            .refresh(ctx, access_uuid, refresh_uuid, user_id)
            .await
    }

    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        self.inner.validate(ctx, access_uuid).await
    }
}
