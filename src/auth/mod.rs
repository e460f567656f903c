//! Identity: bearer tokens and the per-request gate that reads them.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>
//!     → gate.rs (extract, verify, subject lookup)
//!     → token.rs (HMAC check, expiry)
//!     → Principal in request extensions, or none (anonymous)
//!     → handlers via CurrentPrincipal
//! ```

pub mod gate;
pub mod principal;
pub mod token;

pub use gate::{authenticate, bearer_token, AuthGate, CurrentPrincipal};
pub use principal::{Principal, Role};
pub use token::{Claims, TokenConfigError, TokenError, TokenService};
