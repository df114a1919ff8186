//! Request-scoped context threaded through every service call.
//!
//! Carries the principal established by the proxy pipeline and the
//! cancellation/deadline of the inbound request. Remote calls and store I/O
//! run through [`RequestContext::guard`] so they are abandoned together with
//! the request.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Authenticated principal attached after successful proxy authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub access_uuid: String,
    pub user_id: u64,
}

/// Why a guarded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Per-request context.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user_id: Option<u64>,
    auth: Option<AuthContext>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that is cancelled when `token` is.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Tighten the deadline to at most `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Attach the user id resolved by the login proxy.
    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach the principal extracted from verified access claims.
    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    pub fn auth(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail fast if the request is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Run `fut` until it completes, the request is cancelled, or the
    /// deadline passes, whichever comes first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_passes_through_completed_future() {
        let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.guard(async { 42 }).await, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn guard_reports_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
        let slow = tokio::time::sleep(Duration::from_secs(10));
        assert_eq!(ctx.guard(slow).await, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn guard_reports_cancellation() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(token.clone());
        token.cancel();
        let never = std::future::pending::<()>();
        assert_eq!(ctx.guard(never).await, Err(Interrupted::Cancelled));
        assert_eq!(ctx.check(), Err(Interrupted::Cancelled));
    }

    #[test]
    fn timeout_only_tightens() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
        let first = ctx.deadline().unwrap();
        let ctx = ctx.with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(first));
    }

    #[test]
    fn principal_is_attached() {
        let ctx = RequestContext::new().with_user_id(3).with_auth(AuthContext {
            access_uuid: "a".into(),
            user_id: 3,
        });
        assert_eq!(ctx.user_id(), Some(3));
        assert_eq!(ctx.auth().map(|a| a.user_id), Some(3));
    }
}
