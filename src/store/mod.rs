//! Persistence boundary.
//!
//! Handlers and the authentication middleware never talk to a database directly;
//! they receive a `UserStore` (the credential store) and a `TaskStore` through
//! `AppState`. Two implementations exist: `postgres::PgStore` for deployments and
//! `memory::MemoryStore` for database-less runs and tests. Both return plain,
//! fully loaded values; a `Task` always carries its tags.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{NewUser, Tag, Task, TaskStatus, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (username, email).
    #[error("{0}")]
    Conflict(String),
    /// The row to mutate does not exist.
    #[error("{0} not found")]
    Missing(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store: user accounts keyed by id, username and email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::Conflict` if the username or email is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>>;
    async fn email_exists(&self, email: &str) -> StoreResult<bool>;
    async fn username_exists(&self, username: &str) -> StoreResult<bool>;
}

/// Tasks, tags and the relation between them.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> StoreResult<Task>;
    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;
    /// Persists title, description, status, due date and archived flag.
    async fn update_task(&self, task: &Task) -> StoreResult<Task>;
    /// Returns whether a task was removed.
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_tasks(&self, filter: &TaskFilter, sort: TaskSort) -> StoreResult<Vec<Task>>;
    async fn count_tasks(&self, filter: &TaskFilter) -> StoreResult<i64>;
    /// Tasks for the ids that exist, in no particular order.
    async fn find_tasks(&self, ids: &[Uuid]) -> StoreResult<Vec<Task>>;
    /// Sets the status of every listed task in one atomic step.
    async fn set_status(&self, ids: &[Uuid], status: TaskStatus) -> StoreResult<Vec<Task>>;

    async fn find_or_create_tag(&self, name: &str) -> StoreResult<Tag>;
    async fn find_tag(&self, id: i32) -> StoreResult<Option<Tag>>;
    /// All tags, sorted by name.
    async fn list_tags(&self) -> StoreResult<Vec<Tag>>;
    /// Attaching an already attached tag is a no-op.
    async fn attach_tag(&self, task_id: Uuid, tag_id: i32) -> StoreResult<()>;
    /// Detaching a tag that is not attached is a no-op.
    async fn detach_tag(&self, task_id: Uuid, tag_id: i32) -> StoreResult<()>;
}

/// Selection criteria for listing and counting one user's tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilter {
    pub owner_id: i32,
    /// When false only unarchived tasks are returned; when true, all of them.
    pub include_archived: bool,
    pub status: Option<TaskStatus>,
    pub tag: Option<String>,
    /// Inclusive due-date range.
    pub due_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Keeps tasks due strictly before this instant that are not `Done`.
    pub overdue_at: Option<DateTime<Utc>>,
}

impl TaskFilter {
    pub fn for_owner(owner_id: i32, include_archived: bool) -> Self {
        Self {
            owner_id,
            include_archived,
            status: None,
            tag: None,
            due_between: None,
            overdue_at: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn due_between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.due_between = Some((start, end));
        self
    }

    pub fn overdue_at(mut self, now: DateTime<Utc>) -> Self {
        self.overdue_at = Some(now);
        self
    }

    /// In-process evaluation of the filter, used by the memory store.
    pub fn matches(&self, task: &Task) -> bool {
        task.user_id == self.owner_id
            && (self.include_archived || !task.archived)
            && self.status.map_or(true, |s| task.status == s)
            && self
                .tag
                .as_deref()
                .map_or(true, |name| task.tags.iter().any(|t| t.name == name))
            && self.due_between.map_or(true, |(start, end)| {
                task.due_date.map_or(false, |due| start <= due && due <= end)
            })
            && self.overdue_at.map_or(true, |now| task.is_overdue_at(now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    DueDate,
    Title,
    Status,
    Id,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::DueDate => "due_date",
            SortField::Title => "title",
            SortField::Status => "status",
            SortField::Id => "id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortField(pub String);

impl fmt::Display for UnknownSortField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Cannot sort by {:?}; use createdAt, dueDate, title, status or id",
            self.0
        )
    }
}

impl FromStr for SortField {
    type Err = UnknownSortField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(SortField::CreatedAt),
            "dueDate" => Ok(SortField::DueDate),
            "title" => Ok(SortField::Title),
            "status" => Ok(SortField::Status),
            "id" => Ok(SortField::Id),
            other => Err(UnknownSortField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc` in any case selects ascending; anything else descending.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some(order) if order.trim().eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl TaskSort {
    pub fn from_params(
        sort_by: Option<&str>,
        order: Option<&str>,
    ) -> Result<Self, UnknownSortField> {
        let field = match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse()?,
            None => SortField::default(),
        };
        Ok(Self {
            field,
            order: SortOrder::parse_lenient(order),
        })
    }

    /// Orders tasks the way the SQL `ORDER BY` of the Postgres store does:
    /// the chosen field, missing due dates last, then creation time and id.
    /// Titles compare bytewise (`COLLATE "C"` on the Postgres side).
    pub fn sort(&self, tasks: &mut [Task]) {
        tasks.sort_by(|a, b| {
            let primary = match self.field {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Title => a.title.cmp(&b.title),
                SortField::Status => a.status.cmp(&b.status),
                SortField::Id => a.id.cmp(&b.id),
                SortField::DueDate => match (a.due_date, b.due_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    // NULLS LAST regardless of direction
                    (Some(_), None) => return std::cmp::Ordering::Less,
                    (None, Some(_)) => return std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                },
            };
            let ordering = primary
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id));
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskDraft, TaskStatus};
    use chrono::Duration;

    fn task(title: &str, due_in_days: Option<i64>) -> Task {
        Task::new(
            TaskDraft {
                title: title.into(),
                description: None,
                status: TaskStatus::Pending,
                due_date: due_in_days.map(|d| Utc::now() + Duration::days(d)),
                archived: false,
            },
            1,
        )
    }

    #[test]
    fn test_sort_params() {
        assert_eq!(TaskSort::from_params(None, None).unwrap(), TaskSort::default());
        assert_eq!(
            TaskSort::from_params(Some("dueDate"), Some("ASC")).unwrap(),
            TaskSort {
                field: SortField::DueDate,
                order: SortOrder::Asc
            }
        );
        assert_eq!(
            TaskSort::from_params(Some("title"), Some("sideways")).unwrap().order,
            SortOrder::Desc
        );
        assert!(TaskSort::from_params(Some("password"), None).is_err());
    }

    #[test]
    fn test_title_sort_is_bytewise() {
        let mut tasks = vec![task("beta", None), task("Zed", None), task("alpha", None)];
        TaskSort {
            field: SortField::Title,
            order: SortOrder::Asc,
        }
        .sort(&mut tasks);
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Zed", "alpha", "beta"]);
    }

    #[test]
    fn test_due_date_sort_puts_missing_last() {
        let mut tasks = vec![task("a", None), task("b", Some(3)), task("c", Some(1))];
        TaskSort {
            field: SortField::DueDate,
            order: SortOrder::Asc,
        }
        .sort(&mut tasks);
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["c", "b", "a"]);

        TaskSort {
            field: SortField::DueDate,
            order: SortOrder::Desc,
        }
        .sort(&mut tasks);
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["b", "c", "a"]);
    }

    #[test]
    fn test_filter_matches() {
        let mut t = task("a", Some(-1));
        t.tags.push(Tag {
            id: 1,
            name: "work".into(),
        });
        let base = TaskFilter::for_owner(1, false);
        assert!(base.matches(&t));
        assert!(!TaskFilter::for_owner(2, true).matches(&t));
        assert!(base.clone().with_tag("work").matches(&t));
        assert!(!base.clone().with_tag("home").matches(&t));
        assert!(!base.clone().with_status(TaskStatus::Done).matches(&t));
        assert!(base.clone().overdue_at(Utc::now()).matches(&t));

        t.archived = true;
        assert!(!base.matches(&t));
        assert!(TaskFilter::for_owner(1, true).matches(&t));
    }
}
