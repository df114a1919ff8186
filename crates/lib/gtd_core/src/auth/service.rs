//! Auth core service: login, logout, refresh and validate.
//!
//! Per access id the lifecycle is Unissued → Active → Revoked, tracked purely
//! by token store membership. Revoked ids never become active again; refresh
//! always mints a fresh access id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AuthError;
use super::store::{TokenStore, fingerprint};
use super::tokenizer::Tokenizer;
use crate::context::RequestContext;
use crate::id::derive_refresh_uuid;

/// Signed access/refresh token strings returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The auth service contract shared by the basic service and its decorators.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Issue a token pair for the user id attached to `ctx`.
    ///
    /// Credentials are resolved by the login proxy before this runs.
    async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError>;

    /// Revoke the access token and its paired refresh token.
    async fn logout(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError>;

    /// Redeem a refresh token for a new pair. Each refresh token redeems once.
    async fn refresh(
        &self,
        ctx: &RequestContext,
        access_uuid: &str,
        refresh_uuid: &str,
        user_id: u64,
    ) -> Result<TokenPair, AuthError>;

    /// `Ok(true)` if the access id is active, `KeyNotFound` otherwise.
    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError>;
}

#[async_trait]
impl<T: AuthService + ?Sized> AuthService for Arc<T> {
    async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        (**self).login(ctx, username, password).await
    }

    async fn logout(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        (**self).logout(ctx, access_uuid).await
    }

    async fn refresh(
        &self,
        ctx: &RequestContext,
        access_uuid: &str,
        refresh_uuid: &str,
        user_id: u64,
    ) -> Result<TokenPair, AuthError> {
        (**self).refresh(ctx, access_uuid, refresh_uuid, user_id).await
    }

    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        (**self).validate(ctx, access_uuid).await
    }
}

/// Auth service backed by a [`Tokenizer`] and a [`TokenStore`].
pub struct BasicAuthService<S> {
    tokenizer: Arc<Tokenizer>,
    store: S,
}

impl<S: TokenStore> BasicAuthService<S> {
    pub fn new(tokenizer: Arc<Tokenizer>, store: S) -> Self {
        Self { tokenizer, store }
    }

    pub fn tokenizer(&self) -> &Arc<Tokenizer> {
        &self.tokenizer
    }

    /// Mint a pair and record both halves. On a failed second write the first
    /// entry is removed again so no half-stored pair remains.
    async fn issue(&self, ctx: &RequestContext, user_id: u64) -> Result<TokenPair, AuthError> {
        let issued = self.tokenizer.generate(user_id)?;
        let access = &issued.access;
        let refresh = &issued.refresh;

        ctx.guard(
            self.store
                .put(&access.uuid, &fingerprint(&access.hash), access.ttl()),
        )
        .await??;

        let stored: Result<(), AuthError> = async {
            ctx.guard(self.store.put(
                &refresh.refresh_uuid,
                &fingerprint(&refresh.hash),
                refresh.ttl(),
            ))
            .await??;
            Ok(())
        }
        .await;
        if let Err(e) = stored {
            if let Err(rollback) = self.store.delete(&access.uuid).await {
                warn!(access_uuid = %access.uuid, error = %rollback, "failed to roll back access entry");
            }
            return Err(e);
        }

        debug!(user_id, access_uuid = %access.uuid, "issued token pair");
        Ok(TokenPair {
            access_token: issued.access.hash,
            refresh_token: issued.refresh.hash,
        })
    }
}

#[async_trait]
impl<S: TokenStore> AuthService for BasicAuthService<S> {
    async fn login(
        &self,
        ctx: &RequestContext,
        _username: &str,
        _password: &str,
    ) -> Result<TokenPair, AuthError> {
        let user_id = match ctx.user_id() {
            Some(id) if id != 0 => id,
            _ => return Err(AuthError::InvalidArgument),
        };
        self.issue(ctx, user_id).await
    }

    async fn logout(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        if access_uuid.is_empty() {
            return Err(AuthError::InvalidArgument);
        }
        // Refresh side first: a partial failure, or an interruption between
        // the two deletes, leaves a token that can no longer mint new pairs.
        let refresh_uuid = derive_refresh_uuid(access_uuid);
        let (refresh_deleted, access_deleted) = ctx
            .guard(async {
                let refresh_deleted = self.store.delete(&refresh_uuid).await;
                let access_deleted = self.store.delete(access_uuid).await;
                (refresh_deleted, access_deleted)
            })
            .await?;

        refresh_deleted?;
        access_deleted?;
        debug!(access_uuid, "revoked token pair");
        Ok(true)
    }

    async fn refresh(
        &self,
        ctx: &RequestContext,
        access_uuid: &str,
        refresh_uuid: &str,
        user_id: u64,
    ) -> Result<TokenPair, AuthError> {
        if access_uuid.is_empty() || refresh_uuid.is_empty() || user_id == 0 {
            return Err(AuthError::InvalidArgument);
        }
        if derive_refresh_uuid(access_uuid) != refresh_uuid {
            return Err(AuthError::ClaimsInvalid);
        }

        // Lookup and removal in one step: of two racing redemptions only one
        // observes the entry.
        ctx.guard(self.store.take(refresh_uuid)).await??;
        ctx.guard(self.store.delete(access_uuid)).await??;

        self.issue(ctx, user_id).await
    }

    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        if access_uuid.is_empty() {
            return Err(AuthError::InvalidArgument);
        }
        ctx.guard(self.store.get(access_uuid)).await??;
        Ok(true)
    }
}
