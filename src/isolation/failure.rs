//! Handler failure reporting.

use std::fmt;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Message shown to clients for any unhandled server-side failure.
pub const GENERIC_SERVER_ERROR: &str = "A server error occurred.";

/// Generic 500 response. Failure details stay in the logs.
pub fn server_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": GENERIC_SERVER_ERROR })),
    )
        .into_response()
}

/// Error type for handlers whose failure must roll back their scope.
///
/// ```ignore
/// async fn create(Extension(scope): Extension<Scope>) -> Result<StatusCode, HandlerError> {
///     store_write(&scope)?;
///     Ok(StatusCode::CREATED)
/// }
/// ```
#[derive(Debug)]
pub struct HandlerError(anyhow::Error);

impl HandlerError {
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(anyhow::Error::msg(message))
    }
}

impl<E> From<E> for HandlerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let mut response = server_error_response();
        response
            .extensions_mut()
            .insert(HandlerFailure(Arc::new(self.0)));
        response
    }
}

/// Response extension marking a failed handler.
#[derive(Debug, Clone)]
pub struct HandlerFailure(Arc<anyhow::Error>);

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_marks_response() {
        let response = HandlerError::msg("disk on fire").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let failure = response.extensions().get::<HandlerFailure>().unwrap();
        assert_eq!(failure.to_string(), "disk on fire");
    }

    #[test]
    fn test_from_std_error_keeps_context() {
        let err: HandlerError = std::io::Error::other("boom").into();
        let response = err.into_response();
        let failure = response.extensions().get::<HandlerFailure>().unwrap();
        assert!(failure.to_string().contains("boom"));
    }
}
