//! Errors surfaced at the service boundary.

use thiserror::Error;

use crate::security::upload::FileValidationError;
use crate::store::{HashError, StoreError};

/// Failure of a user-facing operation.
///
/// Expected outcomes (bad credentials, rejected files, exhausted buckets)
/// carry client-safe messages. [`ServiceError::Storage`],
/// [`ServiceError::Hash`] and [`ServiceError::Internal`] are unexpected and
/// are reported to clients as a generic failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Only sellers can upload avatars")]
    AvatarNotAllowed,

    #[error("{0}")]
    InvalidFile(#[from] FileValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied: Insufficient permissions")]
    Forbidden,

    #[error("Too many login attempts. Please try again later.")]
    RateLimited,

    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    #[error("credential hashing failure: {0}")]
    Hash(#[from] HashError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailTaken(_) => ServiceError::EmailTaken,
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl ServiceError {
    /// True for failures the client did not cause.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ServiceError::Storage(_) | ServiceError::Hash(_) | ServiceError::Internal(_)
        )
    }
}
