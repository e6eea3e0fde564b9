use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::not_blank;

/// A label shared by all users. Created the first time a task is tagged with its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

/// Payload of `POST /api/tasks/{id}/tags`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TagRequest {
    #[serde(default)]
    #[validate(length(max = 50), custom = "not_blank")]
    pub tag_name: String,
}

impl TagRequest {
    /// Tag names are stored trimmed.
    pub fn name(&self) -> &str {
        self.tag_name.trim()
    }
}
