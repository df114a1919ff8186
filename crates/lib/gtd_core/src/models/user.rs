//! User domain model.

/// Stored user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
    /// bcrypt hash.
    pub password_hash: String,
}
