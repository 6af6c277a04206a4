//! The batch endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    Json,
};
use futures_util::FutureExt;
use serde_json::Value;

use crate::batch::dispatch::Dispatcher;
use crate::batch::envelope::BatchResult;
use crate::batch::error::BatchError;
use crate::batch::request::validate_batch;
use crate::batch::settings::BatchSettings;
use crate::batch::synthetic::{ParentRequest, SyntheticRequest, SyntheticRequestBuilder};
use crate::executor::{DispatchFn, Executor};
use crate::observability::metrics;

/// Everything the batch endpoint needs, built once at startup.
#[derive(Clone)]
pub struct BatchState {
    settings: Arc<BatchSettings>,
    builder: SyntheticRequestBuilder,
    executor: Arc<dyn Executor>,
    dispatcher: Dispatcher,
}

impl BatchState {
    pub fn new(
        settings: Arc<BatchSettings>,
        executor: Arc<dyn Executor>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            builder: SyntheticRequestBuilder::new(settings.clone()),
            settings,
            executor,
            dispatcher,
        }
    }

    fn dispatch_fn(&self) -> DispatchFn {
        let dispatcher = self.dispatcher.clone();
        Arc::new(move |request: SyntheticRequest| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(request).await }.boxed()
        })
    }
}

/// `POST` handler: validate, check the limit, execute, answer in order.
pub async fn batch_handler(
    State(state): State<BatchState>,
    request: Request<Body>,
) -> Result<Json<BatchResult>, BatchError> {
    let (parts, body) = request.into_parts();
    let parent = ParentRequest::from_parts(&parts);

    let result = run_batch(&state, &parent, body).await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(BatchError::Executor(_)) => "failed",
        Err(_) => "rejected",
    };
    metrics::record_batch_outcome(outcome);
    result.map(Json)
}

async fn run_batch(
    state: &BatchState,
    parent: &ParentRequest,
    body: Body,
) -> Result<BatchResult, BatchError> {
    let bytes = axum::body::to_bytes(body, state.settings.max_body_size)
        .await
        .map_err(|e| BatchError::Body(e.to_string()))?;
    let payload: Value =
        serde_json::from_slice(&bytes).map_err(|e| BatchError::MalformedJson(e.to_string()))?;

    let items = validate_batch(&payload).map_err(|errors| {
        tracing::info!(fields = errors.len(), "Batch rejected by validation");
        BatchError::Validation(errors)
    })?;

    if items.len() > state.settings.max_limit {
        tracing::warn!(
            count = items.len(),
            max_limit = state.settings.max_limit,
            "Batch rejected over limit"
        );
        return Err(BatchError::OverLimit {
            max: state.settings.max_limit,
        });
    }

    let lines: Vec<String> = items
        .iter()
        .map(|item| format!("{} {}", item.method.as_http(), item.path))
        .collect();
    tracing::info!(
        count = items.len(),
        executor = state.executor.name(),
        "Batch requests:\n    {}",
        lines.join("\n    ")
    );

    let requests = items
        .into_iter()
        .map(|item| state.builder.build(parent, item))
        .collect::<Vec<_>>();
    let size = requests.len();

    let start = Instant::now();
    let responses = state.executor.execute(requests, state.dispatch_fn()).await?;
    metrics::record_batch(size, state.executor.name(), start.elapsed());

    Ok(BatchResult { responses })
}
