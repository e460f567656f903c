//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace span, timeout)
//!     → auth gate (Principal or anonymous)
//!     → [login only] rate limiter
//!     → handlers.rs (decode, authorize, call service)
//!     → response.rs (envelope, status mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::client_address;
pub use response::ApiResponse;
pub use server::{AppState, HttpServer};
