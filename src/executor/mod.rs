//! Batch executors.
//!
//! # Data Flow
//! ```text
//! Vec<SyntheticRequest> + DispatchFn
//!     → sequential.rs   (one at a time, on the request task)
//!     → worker_pool.rs  (fixed workers draining a shared queue)
//!     → bounded.rs      (task per item, semaphore-gated)
//!     → Vec<ResponseEnvelope> in input order
//! ```
//!
//! # Design Decisions
//! - Executors know nothing about HTTP; they only drive a dispatch function
//! - A panicking dispatch becomes a 500 envelope for that item only
//! - The executor is built once at startup and shared by every batch call

pub mod bounded;
pub mod sequential;
pub mod worker_pool;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::batch::envelope::ResponseEnvelope;
use crate::batch::synthetic::SyntheticRequest;
use crate::config::schema::{BatchConfig, ExecutorKind};

pub(crate) use crate::isolation::atomic::panic_message;

pub use bounded::BoundedExecutor;
pub use sequential::SequentialExecutor;
pub use worker_pool::WorkerPool;

pub type DispatchFuture = BoxFuture<'static, ResponseEnvelope>;

/// Turns one synthetic request into its envelope.
pub type DispatchFn = Arc<dyn Fn(SyntheticRequest) -> DispatchFuture + Send + Sync>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("a concurrent executor needs at least one worker")]
    ZeroWorkers,

    #[error("no async runtime available to host the worker pool")]
    NoRuntime,

    #[error("worker pool is shut down")]
    PoolClosed,

    #[error("no response was produced for item {index}")]
    MissingResult { index: usize },
}

/// Runs a batch of sub-requests.
///
/// Implementations must return exactly one envelope per request, at the
/// request's input position, regardless of completion order.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        requests: Vec<SyntheticRequest>,
        dispatch: DispatchFn,
    ) -> Result<Vec<ResponseEnvelope>, ExecutorError>;
}

/// Build the executor selected by configuration.
///
/// Must be called from within a tokio runtime when a worker pool is
/// selected.
pub fn build_executor(config: &BatchConfig) -> Result<Arc<dyn Executor>, ExecutorError> {
    if !config.execute_parallel {
        return Ok(Arc::new(SequentialExecutor));
    }
    let executor: Arc<dyn Executor> = match config.concurrent_executor {
        ExecutorKind::WorkerPool => Arc::new(WorkerPool::new(config.num_workers)?),
        ExecutorKind::Bounded => Arc::new(BoundedExecutor::new(config.num_workers)?),
    };
    tracing::info!(
        executor = executor.name(),
        workers = config.num_workers,
        "Concurrent batch executor ready"
    );
    Ok(executor)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_executor_follows_config() {
        let sequential = build_executor(&BatchConfig::default()).unwrap();
        assert_eq!(sequential.name(), "sequential");

        let pool = build_executor(&BatchConfig {
            execute_parallel: true,
            num_workers: 2,
            ..BatchConfig::default()
        })
        .unwrap();
        assert_eq!(pool.name(), "worker_pool");

        let bounded = build_executor(&BatchConfig {
            execute_parallel: true,
            concurrent_executor: ExecutorKind::Bounded,
            num_workers: 2,
            ..BatchConfig::default()
        })
        .unwrap();
        assert_eq!(bounded.name(), "bounded");
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let result = build_executor(&BatchConfig {
            execute_parallel: true,
            num_workers: 0,
            ..BatchConfig::default()
        });
        assert!(matches!(result, Err(ExecutorError::ZeroWorkers)));
    }

    #[test]
    fn test_worker_pool_needs_runtime() {
        let result = WorkerPool::new(2);
        assert!(matches!(result, Err(ExecutorError::NoRuntime)));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
