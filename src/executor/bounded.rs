//! Semaphore-bounded executor.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{panic_message, DispatchFn, Executor, ExecutorError};
use crate::batch::envelope::ResponseEnvelope;
use crate::batch::synthetic::SyntheticRequest;

/// Spawns one task per item; a shared semaphore caps how many dispatch at
/// once across all concurrent batches.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl BoundedExecutor {
    pub fn new(limit: usize) -> Result<Self, ExecutorError> {
        if limit == 0 {
            return Err(ExecutorError::ZeroWorkers);
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[async_trait]
impl Executor for BoundedExecutor {
    fn name(&self) -> &'static str {
        "bounded"
    }

    async fn execute(
        &self,
        requests: Vec<SyntheticRequest>,
        dispatch: DispatchFn,
    ) -> Result<Vec<ResponseEnvelope>, ExecutorError> {
        let total = requests.len();
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let dispatch = dispatch.clone();
            let permits = self.permits.clone();
            tasks.spawn(async move {
                let path = request.path.clone();
                let Ok(_permit) = permits.acquire_owned().await else {
                    tracing::error!(path = %path, "Semaphore closed, cannot dispatch sub-request");
                    return (index, ResponseEnvelope::server_error(&path));
                };
                let envelope = match AssertUnwindSafe(async { dispatch(request).await })
                    .catch_unwind()
                    .await
                {
                    Ok(envelope) => envelope,
                    Err(panic) => {
                        tracing::error!(path = %path, panic_msg = %panic_message(&*panic), "Sub-request dispatch panicked");
                        ResponseEnvelope::server_error(&path)
                    }
                };
                (index, envelope)
            });
        }

        let mut slots: Vec<Option<ResponseEnvelope>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, envelope)) => slots[index] = Some(envelope),
                Err(e) => tracing::error!(error = %e, "Sub-request task failed to join"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(ExecutorError::MissingResult { index }))
            .collect()
    }
}
