//! Shared application state for route handlers.

use std::time::Instant;

use doccache_storage::CacheStore;

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: CacheStore,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            start_time: Instant::now(),
        }
    }
}
