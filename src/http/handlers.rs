//! Route handlers for `/api/users`.
//!
//! Handlers are thin: they decode the request, ask [`CurrentPrincipal`] for
//! the identity they need, and delegate to the service layer.

use axum::{
    extract::{multipart::Multipart, rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::auth::{CurrentPrincipal, Role};
use crate::error::ServiceError;
use crate::http::request::read_upload;
use crate::http::response::ApiResponse;
use crate::http::server::AppState;
use crate::service::{AvatarUpload, LoginRequest, RegisterRequest, UpdateProfileRequest};

const USER_PART: &str = "user";
const AVATAR_PART: &str = "avatar";

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    body.map(|Json(value)| value)
        .map_err(|e| ServiceError::BadRequest(e.body_text()))
}

/// `POST /register`: multipart with a JSON `user` part and optional `avatar`.
pub async fn register(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let mut request: Option<RegisterRequest> = None;
    let mut avatar: Option<AvatarUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(USER_PART) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::BadRequest(e.body_text()))?;
                let parsed = serde_json::from_str(&text)
                    .map_err(|e| ServiceError::BadRequest(format!("Invalid user part: {}", e)))?;
                request = Some(parsed);
            }
            Some(AVATAR_PART) => {
                let upload = read_upload(field).await?;
                // An empty part means no file was picked.
                if !upload.bytes.is_empty() {
                    avatar = Some(upload);
                }
            }
            _ => {}
        }
    }

    let request = request.ok_or_else(|| ServiceError::BadRequest("Missing 'user' part".into()))?;
    let user = state.users.register(request, avatar).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("User registered successfully", user),
    ))
}

/// `POST /login`. Rate limited by the route layer before this runs.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = json_body(body)?;
    let auth = state.auth.clone();

    let response =
        tokio::task::spawn_blocking(move || auth.login(&request.email, &request.password))
            .await??;

    Ok(ApiResponse::ok("Login successful", response))
}

/// `GET /profile`
pub async fn get_profile(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
) -> Result<impl IntoResponse, ServiceError> {
    let principal = principal.require()?;
    let user = state.users.get_profile(&principal.subject)?;
    Ok(ApiResponse::ok("Profile retrieved successfully", user))
}

/// `PUT /profile`
pub async fn update_profile(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let principal = principal.require()?;
    let request = json_body(body)?;
    let user = state.users.update_profile(&principal.subject, request)?;
    Ok(ApiResponse::ok("Profile updated successfully", user))
}

/// `PUT /profile/avatar`: sellers only.
pub async fn update_avatar(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let principal = principal.require_role(Role::Seller)?;

    let mut avatar: Option<AvatarUpload> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(e.body_text()))?
    {
        if field.name() == Some(AVATAR_PART) {
            avatar = Some(read_upload(field).await?);
        }
    }

    let avatar = avatar.ok_or_else(|| ServiceError::BadRequest("Missing 'avatar' part".into()))?;
    let user = state.users.update_avatar(&principal.subject, avatar).await?;
    Ok(ApiResponse::ok("Avatar updated successfully", user))
}
