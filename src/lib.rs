//! REST batch request executor library.

pub mod api;
pub mod auth;
pub mod batch;
pub mod config;
pub mod executor;
pub mod http;
pub mod isolation;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
