#![allow(dead_code)]

use actix_web::{http::StatusCode, test, web};
use serde_json::{json, Value};
use tasknest::{auth::LoginResponse, config::Config, state::AppState};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789";

/// State over a fresh in-memory store, with a cheap bcrypt cost.
pub fn test_state() -> web::Data<AppState> {
    let config = Config::from_lookup(|key| match key {
        "JWT_SECRET" => Some(TEST_SECRET.to_string()),
        "BCRYPT_COST" => Some("4".to_string()),
        _ => None,
    })
    .expect("test configuration is valid");
    web::Data::new(AppState::in_memory(&config).expect("in-memory state builds"))
}

/// Builds the application the same way `main` does, over the given state.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .wrap(tasknest::auth::AuthMiddleware)
                .wrap(
                    actix_cors::Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header()
                        .max_age(3600),
                )
                .wrap(actix_web::middleware::Logger::default())
                .service(tasknest::routes::health::health)
                .service(actix_web::web::scope("/api").configure(tasknest::routes::config)),
        )
        .await
    };
}

pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token))
    }
}

pub async fn register_user(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    username: &str,
    email: &str,
    password: &str,
) -> (StatusCode, Value) {
    let req = test::TestRequest::post()
        .uri("/api/users")
        .set_json(&json!({
            "username": username,
            "email": email,
            "password": password
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub async fn login(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    username: &str,
    password: &str,
) -> Result<String, String> {
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(&json!({ "username": username, "password": password }))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    if status != StatusCode::OK {
        return Err(format!(
            "Login failed. Status: {}. Body: {}",
            status,
            String::from_utf8_lossy(&body)
        ));
    }
    let response: LoginResponse = serde_json::from_slice(&body)
        .map_err(|e| format!("Failed to parse login response: {}", e))?;
    Ok(response.token)
}

pub async fn register_and_login_user(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    username: &str,
) -> TestUser {
    let password = "Password123!";
    let (status, body) =
        register_user(app, username, &format!("{}@example.com", username), password).await;
    assert_eq!(status, StatusCode::OK, "Registration failed. Body: {:?}", body);
    let token = login(app, username, password).await.unwrap();
    TestUser {
        id: body["id"].as_i64().unwrap() as i32,
        username: username.to_string(),
        token,
    }
}
