//! Batch request subsystem.
//!
//! # Data Flow
//! ```text
//! POST {"requests": [...]}
//!     → request.rs (validate & normalize items)
//!     → handler.rs (limit check)
//!     → synthetic.rs (one in-process request per item)
//!     → executor (sequential or concurrent)
//!         → dispatch.rs (router + isolation scope, per item)
//!         → envelope.rs (normalize outcome)
//!     → {"responses": [...]} in input order
//! ```
//!
//! # Design Decisions
//! - Validation and the limit check reject the batch before any dispatch
//! - After that, per-item failures become envelopes; the batch succeeds
//! - Sub-requests inherit the caller's principal and allow-listed headers

pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod request;
pub mod settings;
pub mod synthetic;

pub use dispatch::Dispatcher;
pub use envelope::{BatchResult, ResponseEnvelope};
pub use error::BatchError;
pub use handler::{batch_handler, BatchState};
pub use request::{validate_batch, BatchMethod, FieldErrors, RequestItem};
pub use settings::BatchSettings;
pub use synthetic::{ParentRequest, SyntheticRequest, SyntheticRequestBuilder};
