//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging/metrics → Build server → Bind
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or trigger → Stop accepting → Drain in-flight batches → Exit
//! ```
//!
//! # Design Decisions
//! - Shutdown is a broadcast so tests can stop a server without signals
//! - The worker pool is dropped with the server, closing its queue

pub mod shutdown;

pub use shutdown::{shutdown_signal, Shutdown};
