//! Background Jobs for the doccache API
//!
//! - `seed`: Writes synthetic status records on a fixed interval
//!
//! # Usage
//!
//! ```ignore
//! use doccache_api::jobs::{seed_task, SeedConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(seed_task(store.clone(), SeedConfig::default(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod seed;

pub use seed::{mock_status, seed_task, SeedConfig, SeedMetrics, SeedSnapshot};
