//! Domain and wire models.

pub mod task;
pub mod user;
pub mod wire;
