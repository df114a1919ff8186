//! In-memory user repository.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{UserError, UserRepository};
use crate::models::user::User;

/// DashMap-backed repository. Ids start at 1; names are unique.
#[derive(Debug)]
pub struct MemoryUserRepository {
    users: DashMap<u64, User>,
    names: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            names: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, UserError> {
        let Some(id) = self.names.get(name).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find(&self, id: u64) -> Result<Option<User>, UserError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, name: &str, password_hash: &str) -> Result<User, UserError> {
        // The name shard stays locked until the user row is in place.
        let Entry::Vacant(slot) = self.names.entry(name.to_string()) else {
            return Err(UserError::InvalidArgument);
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            name: name.to_string(),
            password_hash: password_hash.to_string(),
        };
        self.users.insert(id, user.clone());
        slot.insert(id);
        Ok(user)
    }
}
