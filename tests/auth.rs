#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::{rt, test, web, App, HttpServer};
use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::TcpListener;
use tasknest::auth::{AuthMiddleware, TokenService};
use tasknest::routes::{self, health};

use common::{login, register_and_login_user, register_user, test_state, TEST_SECRET};

async fn get_tasks_with(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    authorization: Option<String>,
) -> (StatusCode, Value) {
    let mut req = test::TestRequest::get().uri("/api/tasks");
    if let Some(value) = authorization {
        req = req.append_header(("Authorization", value));
    }
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[test_log::test(actix_rt::test)]
async fn test_register_and_login_flow() {
    let state = test_state();
    let app = test_app!(state);

    let (status, body) = register_user(&app, "integration_user", "integration@example.com", "Password123!").await;
    assert_eq!(status, StatusCode::OK, "Registration failed. Body: {:?}", body);
    assert_eq!(body["username"], "integration_user");
    assert_eq!(body["email"], "integration@example.com");
    assert!(body["id"].is_number());
    assert!(body["createdAt"].is_string());
    assert!(body.get("passwordHash").is_none(), "password hash leaked: {:?}", body);

    // Same email again
    let (status, body) = register_user(&app, "someone_else", "integration@example.com", "Password123!").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Duplicate email accepted. Body: {:?}", body);
    assert_eq!(body["error"], "Email already in use");

    // Same username, different email
    let (status, body) = register_user(&app, "integration_user", "other@example.com", "Password123!").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Duplicate username accepted. Body: {:?}", body);

    let token = login(&app, "integration_user", "Password123!").await.unwrap();
    assert!(!token.is_empty(), "Token should be a non-empty string");

    let (status, body) = get_tasks_with(&app, Some(format!("Bearer {}", token))).await;
    assert_eq!(status, StatusCode::OK, "Protected route rejected the token. Body: {:?}", body);
    assert_eq!(body, json!([]));
}

#[actix_rt::test]
async fn test_login_rejects_bad_credentials() {
    let state = test_state();
    let app = test_app!(state);
    register_and_login_user(&app, "alice").await;

    for (username, password) in [("alice", "wrong-password"), ("nobody", "Password123!")] {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(&json!({ "username": username, "password": password }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Invalid credentials" }));
    }
}

#[actix_rt::test]
async fn test_protected_routes_require_valid_token() {
    let state = test_state();
    let app = test_app!(state);
    let alice = register_and_login_user(&app, "alice").await;

    let (status, body) = get_tasks_with(&app, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing token");

    let (status, _) = get_tasks_with(&app, Some(alice.token.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "token without Bearer prefix accepted");

    let (status, body) = get_tasks_with(&app, Some("Bearer not.a.jwt".into())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");

    let forged = TokenService::new("some-other-secret", Duration::hours(1))
        .issue("alice")
        .unwrap();
    let (status, body) = get_tasks_with(&app, Some(format!("Bearer {}", forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");

    let expired = TokenService::new(TEST_SECRET, Duration::seconds(-60))
        .issue("alice")
        .unwrap();
    let (status, body) = get_tasks_with(&app, Some(format!("Bearer {}", expired))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token expired");

    let ghost = TokenService::new(TEST_SECRET, Duration::hours(1))
        .issue("ghost")
        .unwrap();
    let (status, body) = get_tasks_with(&app, Some(format!("Bearer {}", ghost))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unknown user");
}

#[actix_rt::test]
async fn test_token_is_bound_to_its_user() {
    let state = test_state();
    let app = test_app!(state);
    let alice = register_and_login_user(&app, "alice").await;

    assert!(state.tokens.validate(&alice.token, "alice"));
    assert!(!state.tokens.validate(&alice.token, "bob"));
}

#[actix_rt::test]
async fn test_public_and_protected_endpoints() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK, "/health should be public");

    // Only POST is public on /api/users and /api/auth/**
    for (method, uri) in [("GET", "/api/tags"), ("GET", "/api/users"), ("GET", "/api/auth/login")] {
        let req = test::TestRequest::default()
            .method(method.parse().unwrap())
            .uri(uri)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{} {} should require a token", method, uri);
    }
}

#[actix_rt::test]
async fn test_registration_validation() {
    let state = test_state();
    let app = test_app!(state);

    let cases = [
        ("valid_name", "invalid-email", "password123"),
        ("valid_name", "test@example.com", "short"),
        ("no spaces!", "test@example.com", "password123"),
        ("ab", "test@example.com", "password123"),
    ];
    for (username, email, password) in cases {
        let (status, body) = register_user(&app, username, email, password).await;
        assert_eq!(
            status,
            StatusCode::BAD_REQUEST,
            "Expected 400 for {:?}. Body: {:?}",
            (username, email, password),
            body
        );
        assert!(body["error"].is_string());
    }

    let req = test::TestRequest::post()
        .uri("/api/users")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_create_task_without_token_over_http() {
    let state = test_state();
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let server_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .wrap(AuthMiddleware)
            .service(health::health)
            .service(web::scope("/api").configure(routes::config))
    })
    .workers(1)
    .listen(listener)
    .expect("Failed to listen")
    .run();
    let handle = server.handle();
    rt::spawn(server);

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://127.0.0.1:{}/api/tasks", port))
        .json(&json!({ "title": "Unauthorized Task", "status": "Pending" }))
        .send()
        .await
        .expect("Failed to send request");

    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED, "Body: {:?}", body);
    assert_eq!(body["error"], "Missing token");

    handle.stop(true).await;
}
