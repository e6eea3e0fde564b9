//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every handler returns `Result<impl Responder, AppError>`, and the authentication
//! middleware renders its failures through the same type, so clients always receive
//! a JSON body of the form `{"error": "..."}`.
//!
//! `AppError` implements `actix_web::error::ResponseError` to map each variant to its
//! HTTP status. Server-side failures (500) never expose their internal detail to the
//! client; the detail is logged instead.

use actix_web::{error::ResponseError, http::StatusCode, HttpRequest, HttpResponse};
use serde_json::json;
use validator::ValidationErrors;

use crate::auth::token::TokenError;
use crate::models::TaskInputError;
use crate::store::{StoreError, UnknownSortField};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Represents all possible errors that can occur while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Authentication failed or is required but missing (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The caller is authenticated but does not own the resource (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// Malformed or invalid request (HTTP 400).
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// The requested resource was not found (HTTP 404).
    #[error("Not Found: {0}")]
    NotFound(String),
    /// Unexpected server-side error (HTTP 500).
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
    /// Error originating from the backing store (HTTP 500).
    #[error("Database Error: {0}")]
    DatabaseError(String),
    /// Input failed field validation (HTTP 400).
    #[error("Validation Error: {0}")]
    ValidationError(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ValidationError(msg) => msg.as_str(),
            AppError::InternalServerError(detail) | AppError::DatabaseError(detail) => {
                log::error!("{}", detail);
                INTERNAL_ERROR_MESSAGE
            }
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
///
/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// Token failures always surface as 401.
impl From<TokenError> for AppError {
    fn from(error: TokenError) -> AppError {
        match error {
            TokenError::Expired => AppError::Unauthorized("Token expired".into()),
            TokenError::Invalid(_) => AppError::Unauthorized("Invalid token".into()),
            TokenError::Signing(msg) => {
                AppError::InternalServerError(format!("Failed to generate token: {}", msg))
            }
        }
    }
}

/// Converts `StoreError` into `AppError`.
///
/// Uniqueness conflicts are client errors and a vanished row is a 404;
/// everything else is a storage failure.
impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::Conflict(msg) => AppError::BadRequest(msg),
            StoreError::Missing(_) => AppError::NotFound(error.to_string()),
            other => AppError::DatabaseError(other.to_string()),
        }
    }
}

impl From<TaskInputError> for AppError {
    fn from(error: TaskInputError) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<UnknownSortField> for AppError {
    fn from(error: UnknownSortField) -> AppError {
        AppError::BadRequest(error.to_string())
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// Error handler for the JSON body, query string and path extractors.
///
/// Installed through `JsonConfig`, `QueryConfig` and `PathConfig` so malformed input
/// yields the same JSON error shape as every other failure.
pub fn extractor_error<E: std::fmt::Display>(error: E, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(error.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_responses() {
        let error = AppError::Unauthorized("Invalid token".into());
        assert_eq!(error.error_response().status(), 401);

        let error = AppError::Forbidden("Not your task".into());
        assert_eq!(error.error_response().status(), 403);

        let error = AppError::BadRequest("Invalid input".into());
        assert_eq!(error.error_response().status(), 400);

        let error = AppError::ValidationError("title: length".into());
        assert_eq!(error.error_response().status(), 400);

        let error = AppError::NotFound("Resource not found".into());
        assert_eq!(error.error_response().status(), 404);

        let error = AppError::InternalServerError("Server error".into());
        assert_eq!(error.error_response().status(), 500);

        let error = AppError::DatabaseError("connection reset".into());
        assert_eq!(error.error_response().status(), 500);
    }

    #[actix_rt::test]
    async fn test_internal_errors_do_not_leak_detail() {
        let error = AppError::DatabaseError("relation \"tasks\" does not exist".into());
        let body = actix_web::body::to_bytes(error.error_response().into_body())
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_store_conflict_is_bad_request() {
        let error: AppError = StoreError::Conflict("Email already in use".into()).into();
        assert!(matches!(error, AppError::BadRequest(ref msg) if msg == "Email already in use"));
    }

    #[test]
    fn test_store_missing_is_not_found() {
        let error: AppError = StoreError::Missing("task").into();
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_task_input_errors_are_bad_request() {
        let error: AppError = TaskInputError::DueDateInPast.into();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "Validation Error: dueDate must be today or later");
    }

    #[test]
    fn test_token_errors_are_unauthorized() {
        let error: AppError = TokenError::Expired.into();
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        let error: AppError = TokenError::Invalid("InvalidSignature".into()).into();
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }
}
