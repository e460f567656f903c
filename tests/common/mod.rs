//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use user_service::auth::TokenService;
use user_service::config::ServiceConfig;
use user_service::http::{AppState, HttpServer};
use user_service::lifecycle::Shutdown;
use user_service::store::{CredentialHasher, HashError, MemoryIdentityStore};

pub const TEST_SECRET: &str = "integration-test-secret-integration-test-secret";
pub const BOUNDARY: &str = "user-service-test-boundary";

pub const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Stores passwords with a prefix. Argon2 is too slow for request-level tests.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        Ok(format!("plain${}", plaintext))
    }

    fn matches(&self, plaintext: &str, hash: &str) -> bool {
        hash.strip_prefix("plain$") == Some(plaintext)
    }
}

/// Config pointing uploads at a fresh temporary directory.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.token.secret = TEST_SECRET.into();
    config.upload.dir = std::env::temp_dir()
        .join(format!("user-service-it-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    config
}

/// A router plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryIdentityStore>,
    pub tokens: TokenService,
    pub config: ServiceConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let store = Arc::new(MemoryIdentityStore::new());
        let state = AppState::from_config(&config, store.clone(), Arc::new(PlainHasher)).unwrap();
        let router = HttpServer::build_router(&config, state);
        let tokens = TokenService::from_config(&config.token).unwrap();
        Self {
            router,
            store,
            tokens,
            config,
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.upload.dir)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Register through the API and return the created user's JSON.
    pub async fn register(&self, name: &str, email: &str, password: &str, role: &str) -> Value {
        let (content_type, body) = MultipartBody::new()
            .json("user", &user_json(name, email, password, role))
            .finish();
        let response = self.send(multipart_request("POST", "/api/users/register", content_type, body, None)).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["data"].clone()
    }

    /// Log in through the API and return the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self.send(login_request(email, password, None)).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body["data"]["token"].as_str().unwrap().to_string()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.config.upload.dir);
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn user_json(name: &str, email: &str, password: &str, role: &str) -> String {
    serde_json::json!({
        "name": name,
        "email": email,
        "password": password,
        "role": role,
    })
    .to_string()
}

pub fn login_request(email: &str, password: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let body = serde_json::json!({ "email": email, "password": password }).to_string();
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/users/login")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, json: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(json.to_string())).unwrap()
}

pub fn multipart_request(
    method: &str,
    uri: &str,
    content_type: String,
    body: Vec<u8>,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

/// Minimal `multipart/form-data` encoder.
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn json(mut self, name: &str, json: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\nContent-Type: application/json\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(json.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Returns the `Content-Type` header value and the encoded body.
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        (format!("multipart/form-data; boundary={}", BOUNDARY), self.body)
    }
}

/// `magic` followed by filler, long enough to sniff.
pub fn image_bytes(magic: &[u8]) -> Vec<u8> {
    let mut bytes = magic.to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

/// Start the real server on a loopback port.
pub async fn start_server(config: ServiceConfig) -> (SocketAddr, Shutdown, Arc<MemoryIdentityStore>) {
    let store = Arc::new(MemoryIdentityStore::new());
    let state = AppState::from_config(&config, store.clone(), Arc::new(PlainHasher)).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = HttpServer::new(config, state);
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown, store)
}
