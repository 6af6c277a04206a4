//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker count, batch limit)
//! - Check that configured header names and values are valid HTTP
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let batch = &config.batch;
    if !batch.path.starts_with('/') {
        errors.push(ValidationError::new("batch.path", "must start with '/'"));
    }
    if batch.max_limit == 0 {
        errors.push(ValidationError::new("batch.max_limit", "must be greater than 0"));
    }
    if batch.execute_parallel && batch.num_workers == 0 {
        errors.push(ValidationError::new(
            "batch.num_workers",
            "must be greater than 0 when execute_parallel is enabled",
        ));
    }
    for (i, name) in batch.pass_headers.iter().enumerate() {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("batch.pass_headers[{i}]"),
                format!("'{name}' is not a valid header name"),
            ));
        }
    }
    if HeaderValue::from_str(&batch.default_content_type).is_err() {
        errors.push(ValidationError::new(
            "batch.default_content_type",
            "is not a valid header value",
        ));
    }
    if batch.add_duration_header
        && HeaderName::from_bytes(batch.duration_header_name.as_bytes()).is_err()
    {
        errors.push(ValidationError::new(
            "batch.duration_header_name",
            format!("'{}' is not a valid header name", batch.duration_header_name),
        ));
    }

    if config.auth.header_prefix.trim().is_empty()
        || config.auth.header_prefix.contains(char::is_whitespace)
    {
        errors.push(ValidationError::new(
            "auth.header_prefix",
            "must be a single non-empty word",
        ));
    }
    for (i, token) in config.auth.tokens.iter().enumerate() {
        if token.token.is_empty() {
            errors.push(ValidationError::new(
                format!("auth.tokens[{i}].token"),
                "may not be empty",
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
