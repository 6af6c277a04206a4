//! Batch settings compiled from configuration at startup.

use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::{BatchConfig, SecurityConfig};
use crate::config::ValidationError;

/// Typed, immutable view of [`BatchConfig`].
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub path: String,
    pub pass_headers: Vec<HeaderName>,
    pub default_content_type: HeaderValue,
    pub use_https: bool,
    /// `None` when duration headers are disabled.
    pub duration_header: Option<HeaderName>,
    pub max_limit: usize,
    pub max_body_size: usize,
}

impl BatchSettings {
    pub fn from_config(
        batch: &BatchConfig,
        security: &SecurityConfig,
    ) -> Result<Self, ValidationError> {
        let pass_headers = batch
            .pass_headers
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    ValidationError::new(
                        "batch.pass_headers",
                        format!("'{name}' is not a valid header name"),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let default_content_type = HeaderValue::from_str(&batch.default_content_type)
            .map_err(|_| {
                ValidationError::new("batch.default_content_type", "is not a valid header value")
            })?;

        let duration_header = if batch.add_duration_header {
            let name = HeaderName::from_bytes(batch.duration_header_name.as_bytes()).map_err(|_| {
                ValidationError::new(
                    "batch.duration_header_name",
                    format!("'{}' is not a valid header name", batch.duration_header_name),
                )
            })?;
            Some(name)
        } else {
            None
        };

        Ok(Self {
            path: batch.path.clone(),
            pass_headers,
            default_content_type,
            use_https: batch.use_https,
            duration_header,
            max_limit: batch.max_limit,
            max_body_size: security.max_body_size,
        })
    }
}
