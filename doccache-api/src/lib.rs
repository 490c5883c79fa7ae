//! doccache API - read-only HTTP surface
//!
//! Exposes the live keys of a [`CacheStore`](doccache_storage::CacheStore)
//! and the documents behind them over Axum, plus health probes and an
//! optional seeding job for demo deployments.

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
