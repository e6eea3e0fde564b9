use crate::{
    auth::hash_password,
    error::AppError,
    models::{NewUser, UserInput},
    state::AppState,
};
use actix_web::{post, web, HttpResponse, Responder};
use validator::Validate;

/// Register a new user
///
/// Creates an account. The response never contains the password hash; log in
/// through `/api/auth/login` to obtain a token.
///
/// ## Request Body:
/// - `username`: 3 to 32 characters, letters, digits, `_` or `-`.
/// - `email`: a valid email address, not already registered.
/// - `password`: at least 6 characters.
///
/// ## Responses:
/// - `200 OK`: The created user as `{id, username, email, createdAt}`.
/// - `400 Bad Request`: Invalid input, or the email or username is already in use.
#[post("")]
pub async fn create_user(
    state: web::Data<AppState>,
    user_data: web::Json<UserInput>,
) -> Result<impl Responder, AppError> {
    user_data.validate()?;
    let input = user_data.into_inner();

    if state.users.email_exists(&input.email).await? {
        return Err(AppError::BadRequest("Email already in use".into()));
    }
    if state.users.username_exists(&input.username).await? {
        return Err(AppError::BadRequest("Username already in use".into()));
    }

    let password_hash = hash_password(&input.password, state.bcrypt_cost)?;
    let user = state
        .users
        .create_user(NewUser {
            username: input.username,
            email: input.email,
            password_hash,
        })
        .await?;

    log::info!("Registered user {} (id {})", user.username, user.id);
    Ok(HttpResponse::Ok().json(user))
}
