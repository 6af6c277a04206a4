//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Batch endpoint and executor settings.
    pub batch: BatchConfig,

    /// Token authentication settings.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Which concurrent executor to build when `execute_parallel` is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Fixed set of long-lived workers draining a shared job queue.
    #[default]
    WorkerPool,
    /// One task per item, gated by a semaphore.
    Bounded,
}

/// Batch endpoint configuration.
///
/// Read once at startup; the executor built from it lives for the whole
/// process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Route the batch endpoint is mounted on.
    pub path: String,

    /// Parent request headers copied into every sub-request.
    pub pass_headers: Vec<String>,

    /// Content type given to sub-requests that carry a body but no
    /// `content-type` header of their own.
    pub default_content_type: String,

    /// Build sub-request URIs with the `https` scheme.
    pub use_https: bool,

    /// Run sub-requests concurrently.
    pub execute_parallel: bool,

    /// Concurrent strategy, only consulted when `execute_parallel` is set.
    pub concurrent_executor: ExecutorKind,

    /// Size of the worker pool.
    pub num_workers: usize,

    /// Attach the dispatch duration to every envelope.
    pub add_duration_header: bool,

    pub duration_header_name: String,

    /// Maximum number of sub-requests in one batch.
    pub max_limit: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            path: "/batch".to_string(),
            pass_headers: vec!["user-agent".to_string(), "cookie".to_string()],
            default_content_type: "application/json".to_string(),
            use_https: false,
            execute_parallel: false,
            concurrent_executor: ExecutorKind::WorkerPool,
            num_workers: num_cpus::get() * 4,
            add_duration_header: true,
            duration_header_name: "x-batch-duration".to_string(),
            max_limit: 20,
        }
    }
}

/// Token authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Scheme expected in front of the token, e.g. `Authorization: JWT <token>`.
    pub header_prefix: String,

    /// Realm advertised in `WWW-Authenticate`.
    pub realm: String,

    /// Tokens accepted by the static verifier.
    pub tokens: Vec<TokenConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header_prefix: "JWT".to_string(),
            realm: "api".to_string(),
            tokens: Vec::new(),
        }
    }
}

/// A single statically issued token and the user it identifies.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    pub token: String,

    pub user_id: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Disabled accounts are rejected even with a valid token.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes, for batch payloads and for each
    /// sub-response collected into an envelope.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.batch.max_limit, 20);
        assert_eq!(config.batch.path, "/batch");
        assert_eq!(config.batch.pass_headers, vec!["user-agent", "cookie"]);
        assert!(!config.batch.execute_parallel);
        assert!(config.batch.num_workers >= 4);
        assert_eq!(config.auth.header_prefix, "JWT");
    }

    #[test]
    fn test_batch_section() {
        let config: AppConfig = toml::from_str(
            r#"
            [batch]
            execute_parallel = true
            concurrent_executor = "bounded"
            num_workers = 3
            max_limit = 5
            pass_headers = ["x-tenant"]

            [[auth.tokens]]
            token = "abc"
            user_id = "42"
            "#,
        )
        .unwrap();

        assert!(config.batch.execute_parallel);
        assert_eq!(config.batch.concurrent_executor, ExecutorKind::Bounded);
        assert_eq!(config.batch.num_workers, 3);
        assert_eq!(config.batch.max_limit, 5);
        assert_eq!(config.batch.pass_headers, vec!["x-tenant"]);
        assert_eq!(config.auth.tokens.len(), 1);
        assert!(config.auth.tokens[0].is_active);
    }
}
