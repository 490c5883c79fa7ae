//! Cached item endpoints.
//!
//! Read-only views over the cache store:
//! - GET /items - All live keys, sorted
//! - GET /items/:key - The document behind a key
//! - GET /count - Number of live keys

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use doccache_storage::CacheStore;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItemsResponse {
    pub keys: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /items
pub async fn list_items(State(state): State<AppState>) -> ApiResult<Json<ListItemsResponse>> {
    let keys: Vec<String> = state
        .store
        .list()?
        .into_iter()
        .map(|key| key.as_str().to_string())
        .collect();

    Ok(Json(ListItemsResponse {
        count: keys.len(),
        keys,
    }))
}

/// GET /items/:key
///
/// JSON documents are returned as `application/json`; anything else as
/// `application/octet-stream`. Unknown, malformed and expired keys all
/// yield 404.
pub async fn get_item(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    let store = state.store.clone();
    let payload = tokio::task::spawn_blocking(move || fetch(&store, &key))
        .await
        .map_err(|e| ApiError::internal_error(format!("Item read task failed: {}", e)))??;

    let content_type = if serde_json::from_slice::<serde_json::Value>(&payload).is_ok() {
        "application/json"
    } else {
        "application/octet-stream"
    };

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], payload).into_response())
}

fn fetch(store: &CacheStore, key: &str) -> ApiResult<Vec<u8>> {
    let key = CacheStore::resolve_token(key)?;
    let payload = store.get(&key)?;
    tracing::debug!(key = %key, bytes = payload.len(), "Served item");
    Ok(payload)
}

/// GET /count
pub async fn count_items(State(state): State<AppState>) -> ApiResult<Json<CountResponse>> {
    Ok(Json(CountResponse {
        count: state.store.count()?,
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/:key", get(get_item))
        .route("/count", get(count_items))
        .with_state(state)
}
