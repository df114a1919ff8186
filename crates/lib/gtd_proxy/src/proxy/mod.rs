//! Authorization proxies, the outermost decorators of a service stack.

pub mod auth;
pub mod task;

use gtd_core::auth::AuthError;
use gtd_core::context::RequestContext;

use crate::remote::{TokenValidator, UserDirectory};

/// Fail unless `access_uuid` is active in the auth service's token store.
pub(crate) async fn require_active_token<V: TokenValidator>(
    tokens: &V,
    ctx: &RequestContext,
    access_uuid: &str,
) -> Result<(), AuthError> {
    if tokens.validate(ctx, access_uuid).await? {
        Ok(())
    } else {
        Err(AuthError::KeyNotFound)
    }
}

/// Fail unless `user_id` still exists in the user service.
pub(crate) async fn require_existing_user<D: UserDirectory>(
    users: &D,
    ctx: &RequestContext,
    user_id: u64,
) -> Result<(), AuthError> {
    if users.is_exists(ctx, user_id).await? {
        Ok(())
    } else {
        Err(AuthError::UserNotFound)
    }
}
