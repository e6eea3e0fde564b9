use crate::{error::AppError, state::AppState};
use actix_web::{get, web, HttpResponse, Responder};

/// Lists every tag known to the system, sorted by name.
///
/// Tags are shared between users, so this is not filtered by owner.
#[get("")]
pub async fn get_tags(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let tags = state.tasks.list_tags().await?;
    Ok(HttpResponse::Ok().json(tags))
}
