//! Atomic execution of a single request.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use futures_util::FutureExt;

use crate::isolation::{
    server_error_response, HandlerFailure, Scope, TransactionError, TransactionProvider,
};

/// Why a scope was rolled back.
#[derive(Debug)]
pub enum Failure {
    Begin(TransactionError),
    Handler(HandlerFailure),
    Panic(String),
    Commit(TransactionError),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Begin(e) => write!(f, "could not begin transaction: {e}"),
            Failure::Handler(e) => write!(f, "handler error: {e}"),
            Failure::Panic(msg) => write!(f, "handler panicked: {msg}"),
            Failure::Commit(e) => write!(f, "commit failed: {e}"),
        }
    }
}

#[derive(Debug)]
pub enum ScopeOutcome {
    Committed(Response),
    RolledBack(Failure),
}

/// Run `call` inside a fresh transaction.
///
/// The scope is inserted into the request extensions before `call` runs.
/// It is rolled back when the response carries a [`HandlerFailure`] or the
/// call panics, and committed otherwise.
pub async fn execute_atomic<F, Fut>(
    provider: &dyn TransactionProvider,
    mut request: Request<Body>,
    call: F,
) -> ScopeOutcome
where
    F: FnOnce(Request<Body>) -> Fut,
    Fut: Future<Output = Response>,
{
    let scope = match provider.begin().await {
        Ok(scope) => scope,
        Err(e) => return ScopeOutcome::RolledBack(Failure::Begin(e)),
    };
    request.extensions_mut().insert(scope.clone());

    let failure = match AssertUnwindSafe(call(request)).catch_unwind().await {
        Ok(response) => match response.extensions().get::<HandlerFailure>() {
            Some(failure) => Failure::Handler(failure.clone()),
            None => match scope.commit().await {
                Ok(()) => return ScopeOutcome::Committed(response),
                Err(e) => Failure::Commit(e),
            },
        },
        Err(panic) => Failure::Panic(panic_message(panic.as_ref())),
    };

    rollback(&scope).await;
    ScopeOutcome::RolledBack(failure)
}

async fn rollback(scope: &Scope) {
    match scope.rollback().await {
        Ok(()) => tracing::debug!(transaction = %scope.id(), "Transaction rolled back"),
        // A failed commit may already have finished the transaction.
        Err(TransactionError::Finished(_)) => {}
        Err(e) => tracing::warn!(transaction = %scope.id(), error = %e, "Rollback failed"),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Middleware wrapping every request in its own transaction.
///
/// Requests that already carry a [`Scope`] (batch sub-requests) pass
/// straight through.
pub async fn atomic_requests(
    State(provider): State<Arc<dyn TransactionProvider>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.extensions().get::<Scope>().is_some() {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    match execute_atomic(provider.as_ref(), request, |req| next.run(req)).await {
        ScopeOutcome::Committed(response) => response,
        ScopeOutcome::RolledBack(failure) => {
            tracing::error!(method = %method, path = %path, error = %failure, "Request rolled back");
            server_error_response()
        }
    }
}
