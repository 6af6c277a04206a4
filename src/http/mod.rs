//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace, timeout, body limit, authentication)
//!     → batch endpoint ──→ executor → dispatcher → application routes
//!     → application routes (each request in its own isolation scope)
//!     → Send to client
//! ```

pub mod server;

pub use server::{HttpServer, StartupError};
