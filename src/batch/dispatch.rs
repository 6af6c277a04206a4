//! Sub-request dispatch.
//!
//! # Responsibilities
//! - Route a synthetic request through the application router
//! - Run it inside its own isolation scope
//! - Map every outcome (no route, failure, response) to an envelope
//!
//! # Design Decisions
//! - The router gets a fallback that tags "no route" responses, so a
//!   handler's own 404 is not mistaken for a routing miss
//! - Nothing escapes `dispatch`: failures become 500 envelopes and are
//!   logged with their cause

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceExt;

use crate::batch::envelope::ResponseEnvelope;
use crate::batch::request::BatchMethod;
use crate::batch::settings::BatchSettings;
use crate::batch::synthetic::SyntheticRequest;
use crate::isolation::{execute_atomic, ScopeOutcome, TransactionProvider};
use crate::observability::metrics;

/// Response extension set by the dispatch fallback.
#[derive(Debug, Clone, Copy)]
pub struct RouteNotFound;

async fn route_not_found() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    response.extensions_mut().insert(RouteNotFound);
    response
}

/// Runs sub-requests against the application router.
#[derive(Clone)]
pub struct Dispatcher {
    router: Router,
    transactions: Arc<dyn TransactionProvider>,
    settings: Arc<BatchSettings>,
}

impl Dispatcher {
    pub fn new(
        routes: Router,
        transactions: Arc<dyn TransactionProvider>,
        settings: Arc<BatchSettings>,
    ) -> Self {
        Self {
            router: routes.fallback(route_not_found),
            transactions,
            settings,
        }
    }

    /// Dispatch one sub-request. Always yields an envelope.
    pub async fn dispatch(&self, request: SyntheticRequest) -> ResponseEnvelope {
        let start = Instant::now();
        let method = request.method;
        let path = request.path.clone();

        let mut envelope = match request.into_http() {
            Ok(http_request) => self.invoke(method, &path, http_request).await,
            Err(e) => {
                tracing::debug!(method = %method, path = %path, error = %e, "Sub-request path cannot be routed");
                ResponseEnvelope::not_found(&path)
            }
        };

        let elapsed = start.elapsed();
        if let Some(name) = &self.settings.duration_header {
            envelope
                .headers
                .insert(name.as_str().to_string(), format!("{:.6}", elapsed.as_secs_f64()));
        }
        metrics::record_item(method.as_str(), envelope.status_code, elapsed);

        envelope
    }

    async fn invoke(&self, method: BatchMethod, path: &str, request: Request<Body>) -> ResponseEnvelope {
        let router = self.router.clone();
        let outcome = execute_atomic(self.transactions.as_ref(), request, |req| async move {
            match router.oneshot(req).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        })
        .await;

        match outcome {
            ScopeOutcome::Committed(response) => {
                if response.extensions().get::<RouteNotFound>().is_some() {
                    tracing::debug!(method = %method, path = %path, "No route for sub-request");
                    return ResponseEnvelope::not_found(path);
                }
                ResponseEnvelope::from_response(path, response, self.settings.max_body_size).await
            }
            ScopeOutcome::RolledBack(failure) => {
                tracing::error!(
                    method = %method,
                    path = %path,
                    error = %failure,
                    "Batch sub-request failed"
                );
                ResponseEnvelope::server_error(path)
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
