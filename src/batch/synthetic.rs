//! Synthetic request construction.
//!
//! # Responsibilities
//! - Copy allow-listed headers from the batch request
//! - Overlay the item's own headers (item wins)
//! - Serialize the item body once
//! - Carry the caller's principal so handlers see the same identity
//!
//! # Design Decisions
//! - Nothing goes over the network; the result is fed straight into the
//!   application router
//! - Only absolute paths are dispatchable; anything else resolves to 404

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{header, request::Parts, HeaderMap, Request},
};
use thiserror::Error;

use crate::auth::Principal;
use crate::batch::request::{BatchMethod, RequestItem};
use crate::batch::settings::BatchSettings;

/// What sub-requests inherit from the batch request that carried them.
#[derive(Debug, Clone, Default)]
pub struct ParentRequest {
    pub headers: HeaderMap,
    pub principal: Option<Principal>,
    pub authority: Option<String>,
}

impl ParentRequest {
    pub fn from_parts(parts: &Parts) -> Self {
        let authority = parts
            .uri
            .authority()
            .map(|a| a.to_string())
            .or_else(|| {
                parts
                    .headers
                    .get(header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_owned)
            });

        Self {
            headers: parts.headers.clone(),
            principal: parts.extensions.get::<Principal>().cloned(),
            authority,
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("path '{0}' is not absolute")]
    RelativePath(String),

    #[error(transparent)]
    Http(#[from] axum::http::Error),
}

/// An in-process request built from one batch item.
#[derive(Debug, Clone)]
pub struct SyntheticRequest {
    pub method: BatchMethod,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub principal: Option<Principal>,
    pub authority: Option<String>,
    pub secure: bool,
}

impl SyntheticRequest {
    pub fn new(method: BatchMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            principal: None,
            authority: None,
            secure: false,
        }
    }

    fn uri(&self) -> Result<String, BuildError> {
        if !self.path.starts_with('/') {
            return Err(BuildError::RelativePath(self.path.clone()));
        }
        Ok(match &self.authority {
            Some(authority) => {
                let scheme = if self.secure { "https" } else { "http" };
                format!("{scheme}://{authority}{}", self.path)
            }
            None => self.path.clone(),
        })
    }

    /// Turn into a request the application router can serve.
    pub fn into_http(self) -> Result<Request<Body>, BuildError> {
        let uri = self.uri()?;
        let body = match self.body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        };

        let mut request = Request::builder()
            .method(self.method.as_http())
            .uri(uri)
            .body(body)?;

        let mut headers = self.headers;
        if let Some(authority) = &self.authority {
            if !headers.contains_key(header::HOST) {
                if let Ok(value) = authority.parse() {
                    headers.insert(header::HOST, value);
                }
            }
        }
        *request.headers_mut() = headers;

        if let Some(principal) = self.principal {
            request.extensions_mut().insert(principal);
        }
        Ok(request)
    }
}

/// Builds [`SyntheticRequest`]s according to [`BatchSettings`].
#[derive(Debug, Clone)]
pub struct SyntheticRequestBuilder {
    settings: Arc<BatchSettings>,
}

impl SyntheticRequestBuilder {
    pub fn new(settings: Arc<BatchSettings>) -> Self {
        Self { settings }
    }

    pub fn build(&self, parent: &ParentRequest, item: RequestItem) -> SyntheticRequest {
        let mut headers = HeaderMap::new();
        for name in &self.settings.pass_headers {
            for value in parent.headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        for (name, value) in &item.headers {
            headers.insert(name.clone(), value.clone());
        }

        let body = item
            .body
            .map(|map| Bytes::from(serde_json::Value::Object(map).to_string()));
        if body.is_some() && !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                self.settings.default_content_type.clone(),
            );
        }

        SyntheticRequest {
            method: item.method,
            path: item.path,
            headers,
            body,
            principal: parent.principal.clone(),
            authority: parent.authority.clone(),
            secure: self.settings.use_https,
        }
    }
}
