//! Task use cases.
//!
//! Every operation that targets a single task resolves the caller's account,
//! loads the task and checks ownership before doing anything else. A task that
//! exists but belongs to someone else is a 403, never a 404.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::task::UnknownStatus;
use crate::models::{BulkStatusRequest, TagRequest, Task, TaskInput, TaskStatus, User};
use crate::state::AppState;
use crate::store::{TaskFilter, TaskSort};

/// What a task listing is restricted to, on top of ownership and archive state.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    All,
    Status(TaskStatus),
    Tag(String),
    /// Inclusive bounds; `start` must not be after `end`.
    DueBetween(DateTime<Utc>, DateTime<Utc>),
    OverdueAt(DateTime<Utc>),
}

impl Criteria {
    fn into_filter(self, owner_id: i32, include_archived: bool) -> TaskFilter {
        let filter = TaskFilter::for_owner(owner_id, include_archived);
        match self {
            Criteria::All => filter,
            Criteria::Status(status) => filter.with_status(status),
            Criteria::Tag(tag) => filter.with_tag(tag),
            Criteria::DueBetween(start, end) => filter.due_between(start, end),
            Criteria::OverdueAt(now) => filter.overdue_at(now),
        }
    }
}

pub struct TaskService<'a> {
    state: &'a AppState,
}

impl<'a> TaskService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Reloads the caller's account; a principal whose user row is gone is a 404.
    async fn current_user(&self, principal: &AuthenticatedUser) -> Result<User, AppError> {
        self.state
            .users
            .find_by_id(principal.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    async fn owned_task(&self, user: &User, task_id: Uuid) -> Result<Task, AppError> {
        let task = self
            .state
            .tasks
            .find_task(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))?;
        if task.user_id != user.id {
            log::warn!(
                "User {} attempted to access task {} owned by user {}",
                user.id,
                task_id,
                task.user_id
            );
            return Err(AppError::Forbidden(
                "You do not have permission to access this task".into(),
            ));
        }
        Ok(task)
    }

    async fn reload(&self, task_id: Uuid) -> Result<Task, AppError> {
        self.state
            .tasks
            .find_task(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))
    }

    pub async fn list(
        &self,
        principal: &AuthenticatedUser,
        criteria: Criteria,
        include_archived: bool,
        sort: TaskSort,
    ) -> Result<Vec<Task>, AppError> {
        if let Criteria::DueBetween(start, end) = &criteria {
            if start > end {
                return Err(AppError::BadRequest(
                    "startDate must not be after endDate".into(),
                ));
            }
        }
        let user = self.current_user(principal).await?;
        let filter = criteria.into_filter(user.id, include_archived);
        Ok(self.state.tasks.list_tasks(&filter, sort).await?)
    }

    pub async fn count(
        &self,
        principal: &AuthenticatedUser,
        criteria: Criteria,
        include_archived: bool,
    ) -> Result<i64, AppError> {
        let user = self.current_user(principal).await?;
        let filter = criteria.into_filter(user.id, include_archived);
        Ok(self.state.tasks.count_tasks(&filter).await?)
    }

    pub async fn create(
        &self,
        principal: &AuthenticatedUser,
        input: TaskInput,
    ) -> Result<Task, AppError> {
        let user = self.current_user(principal).await?;
        let draft = input.into_draft(Utc::now().date_naive())?;
        let task = self.state.tasks.insert_task(Task::new(draft, user.id)).await?;
        log::info!("User {} created task {}", user.id, task.id);
        Ok(task)
    }

    pub async fn get(&self, principal: &AuthenticatedUser, task_id: Uuid) -> Result<Task, AppError> {
        let user = self.current_user(principal).await?;
        self.owned_task(&user, task_id).await
    }

    pub async fn update(
        &self,
        principal: &AuthenticatedUser,
        task_id: Uuid,
        input: TaskInput,
    ) -> Result<Task, AppError> {
        let user = self.current_user(principal).await?;
        let mut task = self.owned_task(&user, task_id).await?;
        task.apply(input.into_draft(Utc::now().date_naive())?);
        let task = self.state.tasks.update_task(&task).await?;
        log::info!("User {} updated task {}", user.id, task.id);
        Ok(task)
    }

    pub async fn delete(&self, principal: &AuthenticatedUser, task_id: Uuid) -> Result<(), AppError> {
        let user = self.current_user(principal).await?;
        self.owned_task(&user, task_id).await?;
        if !self.state.tasks.delete_task(task_id).await? {
            return Err(AppError::NotFound("Task not found".into()));
        }
        log::info!("User {} deleted task {}", user.id, task_id);
        Ok(())
    }

    pub async fn set_archived(
        &self,
        principal: &AuthenticatedUser,
        task_id: Uuid,
        archived: bool,
    ) -> Result<Task, AppError> {
        let user = self.current_user(principal).await?;
        let mut task = self.owned_task(&user, task_id).await?;
        task.archived = archived;
        let task = self.state.tasks.update_task(&task).await?;
        log::info!(
            "User {} {} task {}",
            user.id,
            if archived { "archived" } else { "unarchived" },
            task.id
        );
        Ok(task)
    }

    pub async fn add_tag(
        &self,
        principal: &AuthenticatedUser,
        task_id: Uuid,
        request: TagRequest,
    ) -> Result<Task, AppError> {
        request.validate()?;
        let user = self.current_user(principal).await?;
        let task = self.owned_task(&user, task_id).await?;
        let tag = self.state.tasks.find_or_create_tag(request.name()).await?;
        if !task.tags.iter().any(|t| t.id == tag.id) {
            self.state.tasks.attach_tag(task.id, tag.id).await?;
            log::info!("Tagged task {} with {:?}", task.id, tag.name);
        }
        self.reload(task.id).await
    }

    pub async fn remove_tag(
        &self,
        principal: &AuthenticatedUser,
        task_id: Uuid,
        tag_id: i32,
    ) -> Result<Task, AppError> {
        let user = self.current_user(principal).await?;
        let task = self.owned_task(&user, task_id).await?;
        let tag = self
            .state
            .tasks
            .find_tag(tag_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tag not found".into()))?;
        self.state.tasks.detach_tag(task.id, tag.id).await?;
        self.reload(task.id).await
    }

    /// All-or-nothing: nothing is written unless every id exists and belongs to the caller.
    pub async fn bulk_update_status(
        &self,
        principal: &AuthenticatedUser,
        request: BulkStatusRequest,
    ) -> Result<Vec<Task>, AppError> {
        if request.task_ids.is_empty() {
            return Err(AppError::BadRequest("taskIds must not be empty".into()));
        }
        let status: TaskStatus = request
            .new_status
            .parse()
            .map_err(|e: UnknownStatus| AppError::BadRequest(e.to_string()))?;
        let user = self.current_user(principal).await?;

        let ids: Vec<Uuid> = request
            .task_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let found = self.state.tasks.find_tasks(&ids).await?;

        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|t| t.id == **id)) {
            return Err(AppError::NotFound(format!("Task {} not found", missing)));
        }
        if let Some(foreign) = found.iter().find(|t| t.user_id != user.id) {
            log::warn!(
                "User {} attempted a bulk status update including task {} owned by user {}",
                user.id,
                foreign.id,
                foreign.user_id
            );
            return Err(AppError::Forbidden(
                "You do not have permission to modify one or more of these tasks".into(),
            ));
        }

        let mut updated = self.state.tasks.set_status(&ids, status).await?;
        updated.sort_by_key(|t| request.task_ids.iter().position(|id| *id == t.id));
        log::info!(
            "User {} set {} task(s) to {}",
            user.id,
            updated.len(),
            status
        );
        Ok(updated)
    }
}
