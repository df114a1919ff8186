//! # gtd_core
//!
//! Token lifecycle engine and domain services for GTD kit.
//!
//! The auth core issues, validates, rotates and revokes access/refresh token
//! pairs. The task and user services are the collaborators that the
//! authorization proxy pipeline in `gtd_proxy` wraps.

pub mod auth;
pub mod context;
pub mod id;
pub mod models;
pub mod task;
pub mod user;
