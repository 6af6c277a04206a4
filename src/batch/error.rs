use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::batch::request::FieldErrors;
use crate::executor::ExecutorError;
use crate::isolation::server_error_response;

/// Errors that reject a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Could not read request body: {0}")]
    Body(String),

    #[error("JSON parse error - {0}")]
    MalformedJson(String),

    #[error("Invalid batch request.")]
    Validation(FieldErrors),

    #[error("You can batch maximum of {max} requests.")]
    OverLimit { max: usize },

    #[error("batch executor failed: {0}")]
    Executor(#[from] ExecutorError),
}

impl IntoResponse for BatchError {
    fn into_response(self) -> Response {
        match self {
            BatchError::Validation(ref errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": self.to_string(), "errors": errors })),
            )
                .into_response(),
            BatchError::Executor(ref e) => {
                tracing::error!(error = %e, "Batch aborted by executor failure");
                server_error_response()
            }
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": self.to_string() })),
            )
                .into_response(),
        }
    }
}
