pub mod tag;
pub mod task;
pub mod user;

use validator::ValidationError;

pub use tag::{Tag, TagRequest};
pub use task::{
    BulkStatusRequest, DueDateFilterQuery, StatusFilterQuery, TagFilterQuery, Task, TaskDraft,
    TaskInput, TaskInputError, TaskListQuery, TaskStatus,
};
pub use user::{NewUser, User, UserInput};

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}
