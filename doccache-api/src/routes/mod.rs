//! HTTP route assembly.

pub mod health;
pub mod items;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full API router.
///
/// Health probes live under `/health`; item routes sit at the root.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .merge(items::create_router(state.clone()))
        .nest("/health", health::create_router(state))
        .layer(TraceLayer::new_for_http())
}
