//! In-memory task repository.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{TaskError, TaskRepository};
use crate::models::task::{Task, TaskDraft};

/// DashMap-backed repository. Ids start at 1.
#[derive(Debug)]
pub struct MemoryTaskRepository {
    tasks: DashMap<u64, Task>,
    next_id: AtomicU64,
}

impl Default for MemoryTaskRepository {
    fn default() -> Self {
        Self {
            tasks: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn create(&self, user_id: u64, draft: TaskDraft) -> Result<Task, TaskError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Task {
            id,
            title: draft.title,
            description: draft.description,
            done: draft.done,
            user_id,
        };
        self.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn find_all(&self, user_id: u64) -> Result<Vec<Task>, TaskError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|t| t.id);
        Ok(tasks)
    }

    async fn find(&self, user_id: u64, task_id: u64) -> Result<Option<Task>, TaskError> {
        Ok(self
            .tasks
            .get(&task_id)
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone()))
    }

    async fn update(
        &self,
        user_id: u64,
        task_id: u64,
        draft: TaskDraft,
    ) -> Result<Option<Task>, TaskError> {
        match self.tasks.get_mut(&task_id) {
            Some(mut entry) if entry.user_id == user_id => {
                entry.title = draft.title;
                entry.description = draft.description;
                entry.done = draft.done;
                Ok(Some(entry.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, user_id: u64, task_id: u64) -> Result<bool, TaskError> {
        Ok(self
            .tasks
            .remove_if(&task_id, |_, task| task.user_id == user_id)
            .is_some())
    }
}
