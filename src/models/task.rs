use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::{not_blank, Tag};

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum; the declaration order is the sort order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "task_status")]
pub enum TaskStatus {
    /// Task is yet to be started.
    Pending,
    /// Task is currently being worked on.
    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,
    /// Task is completed.
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Status must be one of 'Pending', 'In Progress' or 'Done', got {:?}",
            self.0
        )
    }
}

/// Status values are matched exactly; no case folding.
impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Represents a task as returned by the API, tags included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    /// Identifier of the user who owns the task.
    pub user_id: i32,
    /// Attached tags, sorted by name.
    pub tags: Vec<Tag>,
}

impl Task {
    /// Creates a new, untagged task owned by `user_id` from an already validated draft.
    pub fn new(draft: TaskDraft, user_id: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            status: draft.status,
            due_date: draft.due_date,
            archived: draft.archived,
            created_at: Utc::now(),
            user_id,
            tags: Vec::new(),
        }
    }

    /// Copies the editable fields of `draft` onto this task.
    pub fn apply(&mut self, draft: TaskDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.status = draft.status;
        self.due_date = draft.due_date;
        self.archived = draft.archived;
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Done && self.due_date.map_or(false, |due| due < now)
    }
}

/// Input structure for creating or updating a task, as received on the wire.
///
/// `status` and `dueDate` stay textual here; `TaskInput::into_draft` turns them
/// into typed values so that bad values are reported as validation errors.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[serde(default)]
    #[validate(length(max = 200), custom = "not_blank")]
    pub title: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub status: String,

    /// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` (UTC) or RFC 3339.
    pub due_date: Option<String>,

    #[serde(default)]
    pub archived: bool,
}

/// A task input whose fields have been checked and parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub archived: bool,
}

/// Why a task input was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskInputError {
    #[error("{0}")]
    Fields(String),
    #[error("{0}")]
    Status(UnknownStatus),
    #[error("Invalid dueDate {0:?}: expected YYYY-MM-DD or an ISO-8601 date-time")]
    DueDateFormat(String),
    #[error("dueDate must be today or later")]
    DueDateInPast,
}

impl TaskInput {
    /// Validates every field and parses status and due date.
    ///
    /// `today` is the current calendar date; a due date on that same day is accepted.
    pub fn into_draft(self, today: NaiveDate) -> Result<TaskDraft, TaskInputError> {
        self.validate()
            .map_err(|e| TaskInputError::Fields(e.to_string()))?;

        let status = self.status.parse().map_err(TaskInputError::Status)?;

        let due_date = match self.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let due = parse_due_date(raw)
                    .ok_or_else(|| TaskInputError::DueDateFormat(raw.to_string()))?;
                if due.date_naive() < today {
                    return Err(TaskInputError::DueDateInPast);
                }
                Some(due)
            }
        };

        Ok(TaskDraft {
            title: self.title.trim().to_string(),
            description: self.description,
            status,
            due_date,
            archived: self.archived,
        })
    }
}

/// Parses a date (midnight UTC), a naive date-time (taken as UTC) or an RFC 3339 timestamp.
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    parse_date_time(raw)
}

/// Parses an ISO-8601 date-time, with or without an offset.
pub fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Payload of `POST /api/tasks/bulk-update-status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    #[serde(default)]
    pub task_ids: Vec<Uuid>,
    #[serde(default)]
    pub new_status: String,
}

/// Query of `GET /api/tasks`, `GET /api/tasks/overdue` and `GET /api/tasks/overdue/count`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    #[serde(default)]
    pub include_archived: bool,
    pub sort_by: Option<String>,
    #[serde(alias = "order")]
    pub sort_order: Option<String>,
}

/// Query of `GET /api/tasks/filter`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFilterQuery {
    pub status: String,
    #[serde(default)]
    pub include_archived: bool,
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub order: Option<String>,
}

/// Query of `GET /api/tasks/filter-by-tag`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagFilterQuery {
    pub tag: String,
    #[serde(default)]
    pub include_archived: bool,
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub order: Option<String>,
}

/// Query of `GET /api/tasks/filter-by-due-date`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueDateFilterQuery {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub include_archived: bool,
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub order: Option<String>,
}
