//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate, limiter, validator, handlers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (x-request-id) set by the HTTP layer and recorded on the trace span
//! - Token failures are logged by kind but never reported to the client
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
