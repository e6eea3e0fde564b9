pub mod auth;
pub mod health;
pub mod tags;
pub mod tasks;
pub mod users;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::web;

use crate::error::extractor_error;

/// Registers every `/api` route. Mounted under `web::scope("/api")`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(extractor_error::<JsonPayloadError>))
        .app_data(web::QueryConfig::default().error_handler(extractor_error::<QueryPayloadError>))
        .app_data(web::PathConfig::default().error_handler(extractor_error::<PathError>))
        .service(web::scope("/auth").service(auth::login))
        .service(web::scope("/users").service(users::create_user))
        .service(
            web::scope("/tasks")
                // Fixed paths first so they are not captured by `/{id}`.
                .service(tasks::get_tasks)
                .service(tasks::create_task)
                .service(tasks::filter_by_status)
                .service(tasks::filter_by_tag)
                .service(tasks::filter_by_due_date)
                .service(tasks::count_overdue)
                .service(tasks::get_overdue)
                .service(tasks::bulk_update_status)
                .service(tasks::get_task)
                .service(tasks::update_task)
                .service(tasks::delete_task)
                .service(tasks::archive_task)
                .service(tasks::unarchive_task)
                .service(tasks::add_tag)
                .service(tasks::remove_tag),
        )
        .service(web::scope("/tags").service(tags::get_tags));
}
