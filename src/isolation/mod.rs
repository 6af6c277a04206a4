//! Per-request isolation scopes.
//!
//! # Data Flow
//! ```text
//! request
//!     → TransactionProvider::begin() → Scope (into request extensions)
//!     → handler runs, reaching its transaction via Extension<Scope>
//!     → atomic.rs decides:
//!         HandlerFailure marker or panic → rollback
//!         anything else                  → commit
//! ```
//!
//! # Design Decisions
//! - One scope per request; batch sub-requests each get their own
//! - Failure is signalled by `HandlerError`, not by status code, so
//!   handlers can still return committed 4xx responses
//! - Panics are caught at the scope boundary and treated as failures

pub mod atomic;
pub mod failure;
pub mod memory;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use atomic::{atomic_requests, execute_atomic, Failure, ScopeOutcome};
pub use failure::{server_error_response, HandlerError, HandlerFailure};
pub use memory::{MemoryStore, MemoryTransaction};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction {0} is already finished")]
    Finished(String),

    #[error("transaction backend unavailable: {0}")]
    Backend(String),
}

/// A unit of work that is either committed or rolled back as a whole.
#[async_trait]
pub trait Transaction: Send + Sync + 'static {
    fn id(&self) -> &str;

    async fn commit(&self) -> Result<(), TransactionError>;

    async fn rollback(&self) -> Result<(), TransactionError>;

    fn as_any(&self) -> &dyn Any;
}

/// Starts new transactions.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    async fn begin(&self) -> Result<Scope, TransactionError>;
}

/// Cloneable handle to the transaction of the current request.
#[derive(Clone)]
pub struct Scope(Arc<dyn Transaction>);

impl Scope {
    pub fn new<T: Transaction>(transaction: T) -> Self {
        Self(Arc::new(transaction))
    }

    pub fn id(&self) -> &str {
        self.0.id()
    }

    /// Borrow the concrete transaction type of the active provider.
    pub fn downcast<T: Transaction>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub(crate) async fn commit(&self) -> Result<(), TransactionError> {
        self.0.commit().await
    }

    pub(crate) async fn rollback(&self) -> Result<(), TransactionError> {
        self.0.rollback().await
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scope").field(&self.id()).finish()
    }
}
