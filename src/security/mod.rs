//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! POST /login:
//!     → rate_limit.rs (per-client bucket, 429 when empty)
//!     → credential check
//!
//! Avatar uploads:
//!     → upload.rs (size, MIME, extension, magic bytes)
//!     → file storage
//! ```
//!
//! # Design Decisions
//! - Declared metadata is untrusted; content sniffing has the final word
//! - Rate limiting runs before credentials are read

pub mod rate_limit;
pub mod upload;

pub use rate_limit::{login_rate_limit, RateLimitPolicy, RateLimiter};
pub use upload::{FileValidationError, FileValidator, ImageFormat, ValidationOutcome};
