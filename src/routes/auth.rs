use crate::{
    auth::{verify_password, verify_unknown_user, LoginRequest, LoginResponse},
    error::AppError,
    state::AppState,
};
use actix_web::{post, web, HttpResponse, Responder};
use validator::Validate;

/// Login user
///
/// Checks the username and password and returns a bearer token.
///
/// ## Responses:
/// - `200 OK`: `{"token": "..."}`.
/// - `400 Bad Request`: If the username or password is missing.
/// - `401 Unauthorized`: Unknown username or wrong password; the two are not distinguished.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let user = state.users.find_by_username(&login_data.username).await?;
    let authenticated = match &user {
        Some(user) => verify_password(&login_data.password, &user.password_hash)?,
        None => verify_unknown_user(&login_data.password, state.bcrypt_cost),
    };

    match user {
        Some(user) if authenticated => {
            let token = state.tokens.issue(&user.username)?;
            log::info!("User {} logged in", user.username);
            Ok(HttpResponse::Ok().json(LoginResponse { token }))
        }
        _ => {
            log::warn!("Failed login attempt for {:?}", login_data.username);
            Err(AppError::Unauthorized("Invalid credentials".into()))
        }
    }
}
