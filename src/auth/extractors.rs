use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

pub const ROLE_USER: &str = "USER";

/// The caller resolved by `AuthMiddleware`.
///
/// Handlers receive it as an argument; it is never mutated after the middleware
/// inserts it into the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub username: String,
    pub role: &'static str,
}

impl AuthenticatedUser {
    pub fn new(user_id: i32, username: String) -> Self {
        Self {
            user_id,
            username,
            role: ROLE_USER,
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>().cloned() {
            Some(user) => ready(Ok(user)),
            // Reached only on a route the middleware let through as public.
            None => ready(Err(
                AppError::Unauthorized("Authentication required".to_string()).into()
            )),
        }
    }
}
