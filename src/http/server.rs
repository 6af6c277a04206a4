//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: application routes plus the batch endpoint
//! - Wire up middleware (tracing, request ID, timeout, body limit, auth)
//! - Build the batch executor once and share it across calls
//! - Bind server to listener and shut down gracefully

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::post, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{authenticate, Authenticator, StaticTokenVerifier, TokenVerifier};
use crate::batch::{batch_handler, BatchSettings, BatchState, Dispatcher};
use crate::config::{AppConfig, ValidationError};
use crate::executor::{build_executor, ExecutorError};
use crate::isolation::{atomic_requests, TransactionProvider};
use crate::lifecycle::shutdown_signal;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid batch settings: {0}")]
    Settings(#[from] ValidationError),

    #[error("failed to build batch executor: {0}")]
    Executor(#[from] ExecutorError),
}

/// HTTP server exposing the application routes and the batch endpoint.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a server authenticating against the tokens in `config`.
    pub fn new(
        config: AppConfig,
        api: Router,
        transactions: Arc<dyn TransactionProvider>,
    ) -> Result<Self, StartupError> {
        let verifier = Arc::new(StaticTokenVerifier::from_config(&config.auth.tokens));
        Self::with_verifier(config, api, transactions, verifier)
    }

    /// Create a server with a custom token verifier.
    pub fn with_verifier(
        config: AppConfig,
        api: Router,
        transactions: Arc<dyn TransactionProvider>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Result<Self, StartupError> {
        let router = Self::build_router(&config, api, transactions, verifier)?;
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &AppConfig,
        api: Router,
        transactions: Arc<dyn TransactionProvider>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Result<Router, StartupError> {
        let settings = Arc::new(BatchSettings::from_config(&config.batch, &config.security)?);
        let executor = build_executor(&config.batch)?;

        // Sub-requests bypass the batch route and authentication; they
        // carry their own scope and the caller's principal.
        let dispatcher = Dispatcher::new(api.clone(), transactions.clone(), settings.clone());
        let state = BatchState::new(settings.clone(), executor, dispatcher);

        let authenticator = Arc::new(Authenticator::new(&config.auth, verifier));

        // The timeout covers direct API calls only. A batch that started
        // executing always runs to completion.
        let api = api
            .layer(middleware::from_fn_with_state(transactions, atomic_requests))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        let router = Router::new()
            .route(&settings.path, post(batch_handler))
            .with_state(state)
            .merge(api)
            .layer(middleware::from_fn_with_state(authenticator, authenticate))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        tracing::info!(
            path = %settings.path,
            max_limit = settings.max_limit,
            "Batch endpoint mounted"
        );
        Ok(router)
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown receiver fires or Ctrl+C.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
