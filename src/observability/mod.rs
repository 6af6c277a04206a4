//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Batch endpoint and dispatcher produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through the trace layer
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
