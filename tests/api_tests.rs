//! End-to-end tests of the `/api/users` routes through the full middleware stack.

use axum::http::StatusCode;
use serde_json::json;

use user_service::auth::Role;
use user_service::auth::TokenService;

mod common;
use common::*;

#[tokio::test]
async fn test_register_and_login() {
    let app = TestApp::new();

    let user = app.register("John Doe", "john@example.com", "password123", "CLIENT").await;
    assert_eq!(user["email"], "john@example.com");
    assert_eq!(user["role"], "CLIENT");
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    let response = app.send(login_request("john@example.com", "password123", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["message"], "Login successful");
    assert_eq!(response.body["data"]["type"], "Bearer");
    assert_eq!(response.body["data"]["user"]["id"], user["id"]);

    let token = response.body["data"]["token"].as_str().unwrap();
    let claims = app.tokens.verify(token).unwrap();
    assert_eq!(claims.sub, user["id"].as_str().unwrap());
    assert_eq!(claims.role, Role::Client);
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = TestApp::new();
    app.register("A", "dup@example.com", "password123", "CLIENT").await;

    let (content_type, body) = MultipartBody::new()
        .json("user", &user_json("B", "dup@example.com", "password123", "SELLER"))
        .finish();
    let response = app
        .send(multipart_request("POST", "/api/users/register", content_type, body, None))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["message"], "Email already registered");
}

#[tokio::test]
async fn test_register_without_user_part() {
    let app = TestApp::new();
    let (content_type, body) = MultipartBody::new()
        .file("avatar", "a.png", "image/png", &image_bytes(&PNG_MAGIC))
        .finish();
    let response = app
        .send(multipart_request("POST", "/api/users/register", content_type, body, None))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("Jane", "jane@example.com", "password123", "CLIENT").await;

    let wrong_password = app.send(login_request("jane@example.com", "nope", None)).await;
    let unknown_email = app.send(login_request("ghost@example.com", "password123", None)).await;

    assert_eq!(wrong_password.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_password.body, unknown_email.body);
    assert_eq!(wrong_password.body["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_profile_requires_identity() {
    let app = TestApp::new();
    app.register("Jane", "jane@example.com", "password123", "CLIENT").await;
    let token = app.login("jane@example.com", "password123").await;

    let anonymous = app.send(get_request("/api/users/profile", None)).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let garbage = app.send(get_request("/api/users/profile", Some("garbage"))).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);

    let ok = app.send(get_request("/api/users/profile", Some(&token))).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["data"]["email"], "jane@example.com");
    assert_eq!(ok.body["message"], "Profile retrieved successfully");
}

#[tokio::test]
async fn test_update_profile() {
    let app = TestApp::new();
    app.register("Jane", "jane@example.com", "password123", "CLIENT").await;
    let token = app.login("jane@example.com", "password123").await;

    let response = app
        .send(json_request("PUT", "/api/users/profile", json!({ "name": "Jane Roe" }), Some(&token)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["name"], "Jane Roe");

    let malformed = app
        .send(json_request("PUT", "/api/users/profile", json!({ "name": 42 }), Some(&token)))
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["success"], false);
}

#[tokio::test]
async fn test_invalid_tokens_do_not_block_public_routes() {
    let app = TestApp::new();
    app.register("Jane", "jane@example.com", "password123", "CLIENT").await;

    let mut request = login_request("jane@example.com", "password123", None);
    request
        .headers_mut()
        .insert("authorization", "Bearer not.a.token".parse().unwrap());
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK);

    let (content_type, body) = MultipartBody::new()
        .json("user", &user_json("Sam", "sam@example.com", "password123", "SELLER"))
        .finish();
    let response = app
        .send(multipart_request(
            "POST",
            "/api/users/register",
            content_type,
            body,
            Some("expired-or-forged"),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_expired_and_foreign_tokens_are_anonymous() {
    let app = TestApp::new();
    let user = app.register("Jane", "jane@example.com", "password123", "CLIENT").await;
    let id = user["id"].as_str().unwrap();

    let issued = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        - 2 * 86_400;
    let expired = app.tokens.issue_at(id, "jane@example.com", Role::Client, issued);
    let response = app.send(get_request("/api/users/profile", Some(&expired))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let other = TokenService::new("some-other-secret-some-other-secret", std::time::Duration::from_secs(60)).unwrap();
    let forged = other.issue(id, "jane@example.com", Role::Client);
    let response = app.send(get_request("/api/users/profile", Some(&forged))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_user_is_anonymous() {
    let app = TestApp::new();
    let user = app.register("Jane", "jane@example.com", "password123", "CLIENT").await;
    let token = app.login("jane@example.com", "password123").await;

    app.store.remove(user["id"].as_str().unwrap());

    let response = app.send(get_request("/api/users/profile", Some(&token))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_client_cannot_upload_avatar() {
    let app = TestApp::new();
    app.register("Jane", "jane@example.com", "password123", "CLIENT").await;
    let token = app.login("jane@example.com", "password123").await;

    let (content_type, body) = MultipartBody::new()
        .file("avatar", "me.png", "image/png", &image_bytes(&PNG_MAGIC))
        .finish();
    let response = app
        .send(multipart_request("PUT", "/api/users/profile/avatar", content_type, body, Some(&token)))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["message"], "Access denied: Insufficient permissions");
}

#[tokio::test]
async fn test_client_cannot_register_with_avatar() {
    let app = TestApp::new();
    let (content_type, body) = MultipartBody::new()
        .json("user", &user_json("Jane", "jane@example.com", "password123", "CLIENT"))
        .file("avatar", "me.png", "image/png", &image_bytes(&PNG_MAGIC))
        .finish();
    let response = app
        .send(multipart_request("POST", "/api/users/register", content_type, body, None))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Only sellers can upload avatars");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_disguised_file_rejected() {
    let app = TestApp::new();
    let (content_type, body) = MultipartBody::new()
        .json("user", &user_json("Sam", "sam@example.com", "password123", "SELLER"))
        .file("avatar", "shell.png", "image/png", b"<?php echo shell_exec($_GET['c']); ?>")
        .finish();
    let response = app
        .send(multipart_request("POST", "/api/users/register", content_type, body, None))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["message"],
        "File content is not a valid PNG, JPEG, or WEBP image"
    );
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_unsupported_type_rejected() {
    let app = TestApp::new();
    let (content_type, body) = MultipartBody::new()
        .json("user", &user_json("Sam", "sam@example.com", "password123", "SELLER"))
        .file("avatar", "anim.gif", "image/gif", b"GIF89a\x01\x00\x01\x00\x00\x00\x00")
        .finish();
    let response = app
        .send(multipart_request("POST", "/api/users/register", content_type, body, None))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Only PNG, JPG, JPEG, and WEBP files are allowed");
}

#[tokio::test]
async fn test_jpeg_named_png_is_accepted() {
    let app = TestApp::new();
    let (content_type, body) = MultipartBody::new()
        .json("user", &user_json("Sam", "sam@example.com", "password123", "SELLER"))
        .file("avatar", "avatar.png", "image/png", &image_bytes(&JPEG_MAGIC))
        .finish();
    let response = app
        .send(multipart_request("POST", "/api/users/register", content_type, body, None))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let avatar = response.body["data"]["avatar"].as_str().unwrap();
    assert!(avatar.ends_with(".png"));
    assert!(app.upload_dir().join(avatar).exists());
}

#[tokio::test]
async fn test_seller_replaces_avatar() {
    let app = TestApp::new();
    let (content_type, body) = MultipartBody::new()
        .json("user", &user_json("Sam", "sam@example.com", "password123", "SELLER"))
        .file("avatar", "first.png", "image/png", &image_bytes(&PNG_MAGIC))
        .finish();
    let created = app
        .send(multipart_request("POST", "/api/users/register", content_type, body, None))
        .await;
    let first = created.body["data"]["avatar"].as_str().unwrap().to_string();

    let token = app.login("sam@example.com", "password123").await;
    let (content_type, body) = MultipartBody::new()
        .file("avatar", "second.JPG", "image/jpeg", &image_bytes(&JPEG_MAGIC))
        .finish();
    let response = app
        .send(multipart_request("PUT", "/api/users/profile/avatar", content_type, body, Some(&token)))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Avatar updated successfully");
    let second = response.body["data"]["avatar"].as_str().unwrap();
    assert!(second.ends_with(".jpg"));
    assert!(app.upload_dir().join(second).exists());
    assert!(!app.upload_dir().join(&first).exists());
}

#[tokio::test]
async fn test_login_rate_limited_per_client() {
    let app = TestApp::new();
    app.register("Jane", "jane@example.com", "password123", "CLIENT").await;

    for _ in 0..5 {
        let response = app
            .send(login_request("jane@example.com", "wrong", Some("203.0.113.7")))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    // Even correct credentials are refused once the bucket is empty.
    let limited = app
        .send(login_request("jane@example.com", "password123", Some("203.0.113.7, 10.0.0.1")))
        .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["success"], false);
    assert_eq!(
        limited.body["message"],
        "Too many login attempts. Please try again later."
    );

    let other = app
        .send(login_request("jane@example.com", "password123", Some("198.51.100.1")))
        .await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_only_applies_to_login() {
    let mut config = test_config();
    config.rate_limit.capacity = 1;
    config.rate_limit.refill_tokens = 1;
    let app = TestApp::with_config(config);

    for i in 0..3 {
        app.register("U", &format!("u{}@example.com", i), "password123", "CLIENT").await;
    }
    let response = app.send(get_request("/api/users/profile", None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_header() {
    let app = TestApp::new();

    let response = app.send(get_request("/api/users/profile", None)).await;
    let id = response.headers.get("x-request-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    let mut request = get_request("/api/users/profile", None);
    request
        .headers_mut()
        .insert("x-request-id", "caller-supplied-id".parse().unwrap());
    let response = app.send(request).await;
    assert_eq!(response.headers.get("x-request-id").unwrap(), "caller-supplied-id");
}
