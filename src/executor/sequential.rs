//! In-order executor.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;

use super::{panic_message, DispatchFn, Executor, ExecutorError};
use crate::batch::envelope::ResponseEnvelope;
use crate::batch::synthetic::SyntheticRequest;

/// Dispatches items one after another on the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

#[async_trait]
impl Executor for SequentialExecutor {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn execute(
        &self,
        requests: Vec<SyntheticRequest>,
        dispatch: DispatchFn,
    ) -> Result<Vec<ResponseEnvelope>, ExecutorError> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            let path = request.path.clone();
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
            responses.push(envelope);
        }
        Ok(responses)
    }
}
