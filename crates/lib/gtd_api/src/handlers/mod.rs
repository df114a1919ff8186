//! Request handlers.

pub mod auth;
pub mod gateway;
pub mod metrics;
pub mod task;
pub mod user;

use std::time::Duration;

use gtd_core::context::RequestContext;

/// Context for one inbound request, bounded by the configured timeout.
///
/// The handler future is dropped if the client goes away, which abandons any
/// store or remote call in flight along with it.
pub(crate) fn request_context(timeout: Duration) -> RequestContext {
    RequestContext::new().with_timeout(timeout)
}
