//! User-facing operations built on the gatekeeping core.
//!
//! # Data Flow
//! ```text
//! POST /login  → [rate limiter] → AuthService::login
//!                    → IdentityStore::find_by_email
//!                    → CredentialHasher::matches
//!                    → TokenService::issue
//!
//! register / update_avatar → FileValidator::validate → AvatarStore::store
//!                          → IdentityStore::save
//! ```

pub mod auth;
pub mod types;
pub mod users;

pub use auth::AuthService;
pub use types::{AvatarUpload, LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest, UserResponse};
pub use users::UserService;
