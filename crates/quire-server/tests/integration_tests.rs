//! Integration tests for the HTTP surface

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use quire_server::{
    build_state,
    config::ServerConfig,
    handlers::{create_router, AnnotatedProfileDto, ErrorResponse, ProfileDto, RegisterResponse},
};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

fn app() -> Router {
    create_router(build_state(&ServerConfig::default_test_config()).unwrap())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn register(app: &Router, name: &str) -> RegisterResponse {
    let (status, body) = send(
        app,
        "POST",
        "/users",
        None,
        Some(json!({ "display_name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    serde_json::from_slice(&body).unwrap()
}

fn error_code(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorResponse>(body).unwrap().code
}

#[tokio::test]
async fn test_friendship_flow_over_http() {
    let app = app();
    let alice = register(&app, "Alice").await;
    let bob = register(&app, "Bob").await;

    let (status, _) = send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(json!({ "target_id": bob.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "GET",
        "/friends/requests/incoming",
        Some(&bob.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let incoming: Vec<ProfileDto> = serde_json::from_slice(&body).unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].id, alice.id);
    assert_eq!(incoming[0].display_name, "Alice");

    let uri = format!("/friends/requests/{}/accept", alice.id);
    let (status, _) = send(&app, "POST", &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/friends", Some(&alice.token), None).await;
    let friends: Vec<ProfileDto> = serde_json::from_slice(&body).unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].id, bob.id);

    // Accepting again reports a distinguishable conflict
    let (status, body) = send(&app, "POST", &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "already_friends_conflict");

    let uri = format!("/users/{}/status", bob.id);
    let (_, body) = send(&app, "GET", &uri, Some(&alice.token), None).await;
    let status: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(status["status"], "friends");

    let uri = format!("/friends/{}", bob.id);
    for _ in 0..2 {
        let (status, _) = send(&app, "DELETE", &uri, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = send(&app, "GET", "/friends", Some(&bob.token), None).await;
    let friends: Vec<ProfileDto> = serde_json::from_slice(&body).unwrap();
    assert!(friends.is_empty());
}

#[tokio::test]
async fn test_error_codes_over_http() {
    let app = app();
    let alice = register(&app, "Alice").await;
    let bob = register(&app, "Bob").await;

    // Self request
    let (status, body) = send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(json!({ "target_id": alice.id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation");

    // Malformed id
    let (status, body) = send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(json!({ "target_id": "not-an-id" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation");

    // Self removal
    let uri = format!("/friends/{}", alice.id);
    let (status, body) = send(&app, "DELETE", &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid_self_operation");

    // Duplicate request
    let request = json!({ "target_id": bob.id });
    send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(request.clone()),
    )
    .await;
    let (status, body) = send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(request),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "request_already_sent");

    // Reciprocal request
    let (status, body) = send(
        &app,
        "POST",
        "/friends/requests",
        Some(&bob.token),
        Some(json!({ "target_id": alice.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "reciprocal_request_exists");

    // Unknown target
    let ghost = quire_domain::UserId::new().to_string();
    let (status, body) = send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(json!({ "target_id": ghost })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");
}

#[tokio::test]
async fn test_reject_is_idempotent_over_http() {
    let app = app();
    let alice = register(&app, "Alice").await;
    let bob = register(&app, "Bob").await;

    send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(json!({ "target_id": bob.id })),
    )
    .await;

    let uri = format!("/friends/requests/{}/reject", alice.id);
    for _ in 0..2 {
        let (status, _) = send(&app, "POST", &uri, Some(&bob.token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(
        &app,
        "GET",
        "/friends/requests/outgoing",
        Some(&alice.token),
        None,
    )
    .await;
    let outgoing: Vec<ProfileDto> = serde_json::from_slice(&body).unwrap();
    assert!(outgoing.is_empty());
}

#[tokio::test]
async fn test_unauthenticated_requests() {
    let app = app();

    for (method, uri) in [
        ("GET", "/friends"),
        ("GET", "/friends/requests/incoming"),
        ("GET", "/users/search?q=a"),
    ] {
        let (status, body) = send(&app, method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(error_code(&body), "unauthenticated");

        let forged = Some("forged.token.value");
        let (status, _) = send(&app, method, uri, forged, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_search_annotates_results() {
    let app = app();
    let alice = register(&app, "Alice").await;
    let bob = register(&app, "Bob").await;
    register(&app, "Bobby").await;

    send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(json!({ "target_id": bob.id })),
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        "/users/search?q=bob&limit=5",
        Some(&alice.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let hits: Vec<AnnotatedProfileDto> = serde_json::from_slice(&body).unwrap();
    let tagged: Vec<_> = hits
        .iter()
        .map(|h| (h.profile.display_name.as_str(), h.status.as_str()))
        .collect();
    assert_eq!(tagged, vec![("Bob", "request_sent"), ("Bobby", "none")]);
}

#[tokio::test]
async fn test_establish_session_for_existing_identity() {
    let app = app();
    let alice = register(&app, "Alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/session/establish",
        None,
        Some(json!({ "user_id": alice.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session: Value = serde_json::from_slice(&body).unwrap();
    let token = session["token"].as_str().unwrap();

    let (status, _) = send(&app, "GET", "/friends", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);

    let ghost = quire_domain::UserId::new().to_string();
    let (status, _) = send(
        &app,
        "POST",
        "/session/establish",
        None,
        Some(json!({ "user_id": ghost })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_rejects_blank_name() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({ "display_name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation");
}

#[tokio::test]
async fn test_establish_session_disabled_by_default() {
    let config = ServerConfig {
        allow_id_sessions: false,
        ..ServerConfig::default_test_config()
    };
    let app = create_router(build_state(&config).unwrap());
    let alice = register(&app, "Alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/session/establish",
        None,
        Some(json!({ "user_id": alice.id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");
    assert!(serde_json::from_slice::<Value>(&body).unwrap().get("token").is_none());
}

#[tokio::test]
async fn test_malformed_input_gets_error_body() {
    let app = app();
    let alice = register(&app, "Alice").await;

    // Body that is not JSON
    let request = Request::builder()
        .method("POST")
        .uri("/friends/requests")
        .header("authorization", format!("Bearer {}", alice.token))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(error_code(&bytes), "validation");

    // Body missing a field
    let (status, body) = send(
        &app,
        "POST",
        "/friends/requests",
        Some(&alice.token),
        Some(json!({ "target": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation");

    // Non-numeric query parameter
    let (status, body) = send(
        &app,
        "GET",
        "/users/search?q=a&limit=lots",
        Some(&alice.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation");
}

#[test]
fn test_server_config_from_toml() {
    let toml = r#"
        bind_address = "0.0.0.0"
        bind_port = 9000
        jwt_secret = "my-secret-key"
    "#;

    let config: ServerConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    assert_eq!(config.token_expiry_secs, 3600); // Default
    assert_eq!(config.database_path, "quire.db"); // Default
    assert!(!config.allow_id_sessions); // Default
}
