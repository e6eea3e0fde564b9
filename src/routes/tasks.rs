use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{
        task::{parse_date_time, UnknownStatus},
        BulkStatusRequest, DueDateFilterQuery, StatusFilterQuery,
        TagFilterQuery, TagRequest, TaskInput, TaskListQuery, TaskStatus,
    },
    services::{Criteria, TaskService},
    state::AppState,
    store::TaskSort,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use chrono::Utc;
use uuid::Uuid;

/// Retrieves the tasks owned by the authenticated user.
///
/// ## Query Parameters:
/// - `includeArchived` (optional, default `false`): Also return archived tasks.
/// - `sortBy` (optional): `createdAt` (default), `dueDate`, `title`, `status` or `id`.
/// - `sortOrder` (optional): `asc` or `desc` (default).
///
/// ## Responses:
/// - `200 OK`: Returns a JSON array of `Task` objects.
/// - `400 Bad Request`: If `sortBy` names an unknown field.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<TaskListQuery>,
) -> Result<impl Responder, AppError> {
    let sort = TaskSort::from_params(query.sort_by.as_deref(), query.sort_order.as_deref())?;
    let tasks = TaskService::new(&state)
        .list(&user, Criteria::All, query.include_archived, sort)
        .await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task for the authenticated user.
///
/// ## Request Body:
/// A JSON object matching `TaskInput`:
/// - `title`: Required, non-blank, at most 200 characters.
/// - `description` (optional): At most 1000 characters.
/// - `status`: One of `Pending`, `In Progress`, `Done`.
/// - `dueDate` (optional): A date or date-time, not before today.
/// - `archived` (optional, default `false`).
///
/// ## Responses:
/// - `200 OK`: Returns the newly created `Task` object as JSON.
/// - `400 Bad Request`: If any field fails validation.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    let task = TaskService::new(&state)
        .create(&user, task_data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Lists the caller's tasks with the given status.
///
/// ## Query Parameters:
/// - `status`: `Pending`, `In Progress` or `Done`.
/// - `includeArchived`, `sortBy`, `order` as for `GET /api/tasks`.
///
/// ## Responses:
/// - `200 OK`: Returns a JSON array of `Task` objects.
/// - `400 Bad Request`: Unknown status or sort field.
#[get("/filter")]
pub async fn filter_by_status(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<StatusFilterQuery>,
) -> Result<impl Responder, AppError> {
    let status: TaskStatus = query
        .status
        .parse()
        .map_err(|e: UnknownStatus| AppError::BadRequest(e.to_string()))?;
    let sort = TaskSort::from_params(query.sort_by.as_deref(), query.order.as_deref())?;
    let tasks = TaskService::new(&state)
        .list(&user, Criteria::Status(status), query.include_archived, sort)
        .await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Lists the caller's tasks carrying the tag named `tag`.
#[get("/filter-by-tag")]
pub async fn filter_by_tag(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<TagFilterQuery>,
) -> Result<impl Responder, AppError> {
    let tag = query.tag.trim();
    if tag.is_empty() {
        return Err(AppError::BadRequest("tag must not be blank".into()));
    }
    let sort = TaskSort::from_params(query.sort_by.as_deref(), query.order.as_deref())?;
    let tasks = TaskService::new(&state)
        .list(&user, Criteria::Tag(tag.to_string()), query.include_archived, sort)
        .await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Lists the caller's tasks due within `[startDate, endDate]`.
///
/// ## Query Parameters:
/// - `startDate`, `endDate`: ISO-8601 date-times; without an offset they are read as UTC.
///
/// ## Responses:
/// - `200 OK`: Returns a JSON array of `Task` objects.
/// - `400 Bad Request`: Unparsable bounds, or `startDate` after `endDate`.
#[get("/filter-by-due-date")]
pub async fn filter_by_due_date(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<DueDateFilterQuery>,
) -> Result<impl Responder, AppError> {
    let bound = |name: &str, raw: &str| {
        parse_date_time(raw.trim())
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {}: {:?}", name, raw)))
    };
    let start = bound("startDate", &query.start_date)?;
    let end = bound("endDate", &query.end_date)?;
    let sort = TaskSort::from_params(query.sort_by.as_deref(), query.order.as_deref())?;
    let tasks = TaskService::new(&state)
        .list(&user, Criteria::DueBetween(start, end), query.include_archived, sort)
        .await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Lists the caller's tasks that are past due and not `Done`.
#[get("/overdue")]
pub async fn get_overdue(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<TaskListQuery>,
) -> Result<impl Responder, AppError> {
    let sort = TaskSort::from_params(query.sort_by.as_deref(), query.sort_order.as_deref())?;
    let tasks = TaskService::new(&state)
        .list(
            &user,
            Criteria::OverdueAt(Utc::now()),
            query.include_archived,
            sort,
        )
        .await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Counts the caller's overdue tasks.
///
/// ## Responses:
/// - `200 OK`: The count as a bare JSON number.
#[get("/overdue/count")]
pub async fn count_overdue(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<TaskListQuery>,
) -> Result<impl Responder, AppError> {
    let count = TaskService::new(&state)
        .count(&user, Criteria::OverdueAt(Utc::now()), query.include_archived)
        .await?;
    Ok(HttpResponse::Ok().json(count))
}

/// Sets the status of several tasks at once.
///
/// ## Request Body:
/// `{"taskIds": [...], "newStatus": "Done"}`
///
/// ## Responses:
/// - `200 OK`: The updated tasks.
/// - `400 Bad Request`: Empty `taskIds` or unknown `newStatus`.
/// - `403 Forbidden`: Any listed task belongs to another user. Nothing is changed.
/// - `404 Not Found`: Any listed task does not exist. Nothing is changed.
#[post("/bulk-update-status")]
pub async fn bulk_update_status(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    request: web::Json<BulkStatusRequest>,
) -> Result<impl Responder, AppError> {
    let tasks = TaskService::new(&state)
        .bulk_update_status(&user, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Retrieves a specific task by its ID.
///
/// ## Responses:
/// - `200 OK`: Returns the `Task` object as JSON.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
/// - `403 Forbidden`: If the task belongs to another user.
/// - `404 Not Found`: If no task has the given ID.
#[get("/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = TaskService::new(&state)
        .get(&user, task_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Replaces the editable fields of a task.
///
/// Every field is validated again, exactly as on creation.
///
/// ## Responses:
/// - `200 OK`: Returns the updated `Task` object.
/// - `400 Bad Request`: If any field fails validation.
/// - `403 Forbidden`: If the task belongs to another user.
/// - `404 Not Found`: If no task has the given ID.
#[put("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    let task = TaskService::new(&state)
        .update(&user, task_id.into_inner(), task_data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Deletes a task.
///
/// ## Responses:
/// - `204 No Content`: The task was deleted.
/// - `403 Forbidden`: If the task belongs to another user.
/// - `404 Not Found`: If no task has the given ID.
#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    TaskService::new(&state)
        .delete(&user, task_id.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/{id}/archive")]
pub async fn archive_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = TaskService::new(&state)
        .set_archived(&user, task_id.into_inner(), true)
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

#[post("/{id}/unarchive")]
pub async fn unarchive_task(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = TaskService::new(&state)
        .set_archived(&user, task_id.into_inner(), false)
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Attaches the tag `tagName` to a task, creating the tag if needed.
///
/// ## Responses:
/// - `200 OK`: The task with its tags.
/// - `400 Bad Request`: Blank or overlong tag name.
/// - `403 Forbidden`: If the task belongs to another user.
/// - `404 Not Found`: If no task has the given ID.
#[post("/{id}/tags")]
pub async fn add_tag(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    task_id: web::Path<Uuid>,
    request: web::Json<TagRequest>,
) -> Result<impl Responder, AppError> {
    let task = TaskService::new(&state)
        .add_tag(&user, task_id.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(task))
}

/// Detaches a tag from a task. The tag itself is kept.
#[delete("/{id}/tags/{tag_id}")]
pub async fn remove_tag(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<(Uuid, i32)>,
) -> Result<impl Responder, AppError> {
    let (task_id, tag_id) = path.into_inner();
    let task = TaskService::new(&state)
        .remove_tag(&user, task_id, tag_id)
        .await?;
    Ok(HttpResponse::Ok().json(task))
}
