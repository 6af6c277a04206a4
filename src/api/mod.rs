//! Reference application routes.
//!
//! A small key-value API over [`MemoryStore`] plus a "who am I" route,
//! enough to exercise the batch endpoint end to end. Writes go through the
//! request's transaction, so they land only when the request commits.

use axum::{
    extract::{FromRequestParts, Path},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::Authenticated;
use crate::isolation::{server_error_response, HandlerError, MemoryTransaction, Scope};

/// Access to the current request's memory-store transaction.
#[derive(Debug, Clone)]
pub struct Store(Scope);

impl Store {
    fn txn(&self) -> Result<&MemoryTransaction, HandlerError> {
        self.0
            .downcast::<MemoryTransaction>()
            .ok_or_else(|| HandlerError::msg("request scope is not backed by the memory store"))
    }
}

impl<S> FromRequestParts<S> for Store
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Scope>().cloned().map(Store).ok_or_else(|| {
            tracing::error!(path = %parts.uri.path(), "Route reached without an isolation scope");
            server_error_response()
        })
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response()
}

async fn get_key(store: Store, Path(key): Path<String>) -> Result<Response, HandlerError> {
    Ok(match store.txn()?.get(&key)? {
        Some(value) => Json(json!({ "key": key, "value": value })).into_response(),
        None => not_found(),
    })
}

async fn put_key(
    store: Store,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<Value>, HandlerError> {
    store.txn()?.put(key.clone(), value.clone())?;
    tracing::debug!(key = %key, "Key staged");
    Ok(Json(json!({ "key": key, "value": value })))
}

async fn delete_key(store: Store, Path(key): Path<String>) -> Result<Response, HandlerError> {
    Ok(if store.txn()?.delete(&key)? {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found()
    })
}

async fn current_user(Authenticated(principal): Authenticated) -> Json<Value> {
    Json(json!({ "user_id": principal.user_id, "email": principal.email }))
}

/// The reference API, without isolation or auth layers (the server adds them).
pub fn routes() -> Router {
    Router::new()
        .route("/kv/{key}", get(get_key).put(put_key).delete(delete_key))
        .route("/user", get(current_user))
}
