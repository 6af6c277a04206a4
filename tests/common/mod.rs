//! Shared utilities for the batch endpoint tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Extension, Path},
    http::{HeaderMap, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use rest_batch::config::{AppConfig, ExecutorKind, TokenConfig};
use rest_batch::isolation::{HandlerError, MemoryStore, MemoryTransaction, Scope};
use rest_batch::{api, HttpServer};

pub const TOKEN: &str = "secret-token";

/// Config with one known token and a small batch limit.
pub fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.batch.num_workers = 4;
    config.batch.max_limit = 5;
    config.auth.tokens = vec![TokenConfig {
        token: TOKEN.to_string(),
        user_id: "42".to_string(),
        email: Some("ada@example.com".to_string()),
        is_active: true,
    }];
    config
}

pub fn parallel(kind: ExecutorKind) -> AppConfig {
    let mut config = config();
    config.batch.execute_parallel = true;
    config.batch.concurrent_executor = kind;
    config
}

/// Every executor configuration worth comparing.
pub fn all_configs() -> Vec<AppConfig> {
    vec![
        config(),
        parallel(ExecutorKind::WorkerPool),
        parallel(ExecutorKind::Bounded),
    ]
}

fn txn(scope: &Scope) -> Result<&MemoryTransaction, HandlerError> {
    scope
        .downcast::<MemoryTransaction>()
        .ok_or_else(|| HandlerError::msg("no memory transaction"))
}

async fn create_item(
    Extension(scope): Extension<Scope>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), HandlerError> {
    let name = body["name"]
        .as_str()
        .ok_or_else(|| HandlerError::msg("name is required"))?
        .to_string();
    txn(&scope)?.put(format!("item:{name}"), body.clone())?;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let mut out = Map::new();
    for (name, value) in &headers {
        out.insert(
            name.as_str().to_string(),
            json!(String::from_utf8_lossy(value.as_bytes())),
        );
    }
    Json(Value::Object(out))
}

async fn fail(Extension(scope): Extension<Scope>) -> Result<Json<Value>, HandlerError> {
    txn(&scope)?.put("fail-key", json!(true))?;
    Err(HandlerError::msg("deliberate failure"))
}

async fn explode(Extension(scope): Extension<Scope>) -> Json<Value> {
    if let Ok(txn) = txn(&scope) {
        let _ = txn.put("panic-key", json!(true));
    }
    panic!("deliberate panic");
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "slept": ms }))
}

/// Reference API plus routes that misbehave on purpose.
pub fn routes() -> Router {
    api::routes()
        .route("/items", post(create_item))
        .route("/echo-headers", get(echo_headers))
        .route("/fail", post(fail))
        .route("/panic", post(explode))
        .route("/text", get(|| async { "plain text" }))
        .route("/slow/{ms}", get(slow))
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
}

pub fn app(config: AppConfig) -> TestApp {
    let store = MemoryStore::new();
    let server = HttpServer::new(config, routes(), Arc::new(store.clone())).unwrap();
    TestApp {
        router: server.router(),
        store,
    }
}

impl TestApp {
    pub async fn batch(&self, payload: Value) -> (StatusCode, Value) {
        self.batch_with(payload.to_string(), &[]).await
    }

    pub async fn batch_with(&self, body: String, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut request = Request::post("/batch").header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

/// Shorthand for one batch item.
pub fn item(method: &str, path: &str) -> Value {
    json!({ "method": method, "path": path })
}

pub fn responses(body: &Value) -> &Vec<Value> {
    body["responses"].as_array().expect("responses array")
}

pub fn statuses(body: &Value) -> Vec<u64> {
    responses(body)
        .iter()
        .map(|r| r["status_code"].as_u64().unwrap())
        .collect()
}
