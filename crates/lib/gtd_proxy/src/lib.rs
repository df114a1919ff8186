//! # gtd_proxy
//!
//! Authorization proxy pipeline for GTD kit services.
//!
//! Every service is assembled as an ordered stack of decorators around its
//! basic implementation:
//!
//! ```text
//! proxy  →  instrumentation  →  logging  →  basic service
//! ```
//!
//! Each decorator is a [`tower::Layer`] that wraps the next one and
//! implements the same service trait, so the stack is fixed at construction
//! time. The proxy decorators authorize callers through the remote
//! collaborators in [`remote`] before the wrapped operation runs, and
//! short-circuit on the first failed check.

pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod remote;
pub mod stack;

pub use metrics::Metrics;
pub use stack::{AuthStack, TaskStack, UserStack, auth_stack, task_stack, user_stack};
