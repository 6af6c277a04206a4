//! Token authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: <prefix> <token>
//!     → middleware.rs (extract token, skip if a principal is already set)
//!     → token.rs (TokenVerifier resolves token → Principal)
//!     → Principal stored in request extensions
//!     → handlers read it through the `Authenticated` extractor
//! ```
//!
//! # Design Decisions
//! - Token issuance and signature checks live behind `TokenVerifier`
//! - Missing or foreign-scheme headers mean anonymous, not failure
//! - Batch sub-requests inherit the parent principal and are never
//!   re-authenticated

pub mod middleware;
pub mod token;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

pub use middleware::{authenticate, Authenticator};
pub use token::{StaticTokenVerifier, TokenVerifier};

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid Authorization header.")]
    InvalidHeader,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("User account is disabled.")]
    Disabled,

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

/// Rejection carrying the `WWW-Authenticate` challenge for a failed token.
pub(crate) fn challenge(error: AuthError, prefix: &str, realm: &str) -> Response {
    let mut response = error.into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("{prefix} realm=\"{realm}\"")) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

/// Extractor that requires an authenticated principal.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Authenticated)
            .ok_or(AuthError::NotAuthenticated)
    }
}
