//! Request inspection helpers.
//!
//! # Responsibilities
//! - Resolve the client address used as a rate-limit key
//! - Buffer multipart file parts into [`AvatarUpload`]s
//!
//! # Design Decisions
//! - The first `X-Forwarded-For` hop wins, as the service is expected to
//!   run behind a trusted proxy. Without it the TCP peer address is used.

use std::net::SocketAddr;

use axum::{
    extract::{multipart::Field, ConnectInfo},
    http::{Extensions, HeaderMap},
};

use crate::error::ServiceError;
use crate::service::AvatarUpload;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Best-effort client address.
pub fn client_address(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(addr) = forwarded {
        return addr.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Read a file part fully, keeping its declared name and content type.
pub async fn read_upload(field: Field<'_>) -> Result<AvatarUpload, ServiceError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ServiceError::BadRequest(e.body_text()))?;

    Ok(AvatarUpload {
        filename,
        content_type,
        bytes,
    })
}
