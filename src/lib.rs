//! User identity service library.
//!
//! Bearer-token authentication, login rate limiting and avatar upload
//! validation in front of a small user CRUD API.

// Gatekeeping core
pub mod auth;
pub mod security;

// Collaborators and operations
pub mod service;
pub mod store;

// Transport
pub mod error;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use error::ServiceError;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
