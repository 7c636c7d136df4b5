//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! client, session and http subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the edge into every log line of a request

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingError};
