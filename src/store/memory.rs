use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, StoreResult, TaskFilter, TaskSort, TaskStore, UserStore};
use crate::models::{NewUser, Tag, Task, TaskStatus, User};

#[derive(Default)]
struct State {
    users: BTreeMap<i32, User>,
    next_user_id: i32,
    /// Stored without tags; `task_tags` is the source of truth for the relation.
    tasks: HashMap<Uuid, Task>,
    tags: BTreeMap<i32, Tag>,
    next_tag_id: i32,
    task_tags: HashMap<Uuid, BTreeSet<i32>>,
}

impl State {
    fn hydrate(&self, task: &Task) -> Task {
        let mut task = task.clone();
        task.tags = self
            .task_tags
            .get(&task.id)
            .into_iter()
            .flatten()
            .filter_map(|tag_id| self.tags.get(tag_id).cloned())
            .collect();
        task.tags.sort_by(|a, b| a.name.cmp(&b.name));
        task
    }
}

/// In-process store with the same observable behavior as the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("Email already in use".into()));
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("Username already in use".into()));
        }
        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|u| u.email == email))
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|u| u.username == username))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, mut task: Task) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        task.tags.clear();
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.get(&id).map(|t| state.hydrate(t)))
    }

    async fn update_task(&self, task: &Task) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        let stored = state
            .tasks
            .get_mut(&task.id)
            .ok_or(StoreError::Missing("task"))?;
        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.status = task.status;
        stored.due_date = task.due_date;
        stored.archived = task.archived;
        let stored = stored.clone();
        Ok(state.hydrate(&stored))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        state.task_tags.remove(&id);
        Ok(state.tasks.remove(&id).is_some())
    }

    async fn list_tasks(&self, filter: &TaskFilter, sort: TaskSort) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .map(|t| state.hydrate(t))
            .filter(|t| filter.matches(t))
            .collect();
        sort.sort(&mut tasks);
        Ok(tasks)
    }

    async fn count_tasks(&self, filter: &TaskFilter) -> StoreResult<i64> {
        let state = self.state.read().await;
        let count = state
            .tasks
            .values()
            .filter(|t| filter.matches(&state.hydrate(t)))
            .count();
        Ok(count as i64)
    }

    async fn find_tasks(&self, ids: &[Uuid]) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        let unique: BTreeSet<&Uuid> = ids.iter().collect();
        Ok(unique
            .into_iter()
            .filter_map(|id| state.tasks.get(id))
            .map(|t| state.hydrate(t))
            .collect())
    }

    async fn set_status(&self, ids: &[Uuid], status: TaskStatus) -> StoreResult<Vec<Task>> {
        let mut state = self.state.write().await;
        if ids.iter().any(|id| !state.tasks.contains_key(id)) {
            return Err(StoreError::Missing("task"));
        }
        let unique: BTreeSet<Uuid> = ids.iter().copied().collect();
        for id in &unique {
            if let Some(task) = state.tasks.get_mut(id) {
                task.status = status;
            }
        }
        Ok(unique
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .map(|t| state.hydrate(t))
            .collect())
    }

    async fn find_or_create_tag(&self, name: &str) -> StoreResult<Tag> {
        let mut state = self.state.write().await;
        if let Some(tag) = state.tags.values().find(|t| t.name == name) {
            return Ok(tag.clone());
        }
        state.next_tag_id += 1;
        let tag = Tag {
            id: state.next_tag_id,
            name: name.to_string(),
        };
        state.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn find_tag(&self, id: i32) -> StoreResult<Option<Tag>> {
        Ok(self.state.read().await.tags.get(&id).cloned())
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let state = self.state.read().await;
        let mut tags: Vec<Tag> = state.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn attach_tag(&self, task_id: Uuid, tag_id: i32) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.tasks.contains_key(&task_id) {
            return Err(StoreError::Missing("task"));
        }
        if !state.tags.contains_key(&tag_id) {
            return Err(StoreError::Missing("tag"));
        }
        state.task_tags.entry(task_id).or_default().insert(tag_id);
        Ok(())
    }

    async fn detach_tag(&self, task_id: Uuid, tag_id: i32) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(tags) = state.task_tags.get_mut(&task_id) {
            tags.remove(&tag_id);
        }
        Ok(())
    }
}
