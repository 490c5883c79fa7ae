//! API Configuration Module
//!
//! Listener address and the optional seeding job. Loaded from environment
//! variables with defaults for development.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Interface to listen on.
    pub bind_host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Period of the mock status seeding job. `None` disables it.
    pub seed_interval: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            seed_interval: None,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DOCCACHE_API_BIND`: Listen interface (default: 0.0.0.0)
    /// - `PORT` or `DOCCACHE_API_PORT`: Listen port (default: 8080)
    /// - `DOCCACHE_SEED_INTERVAL_MS`: Seeding period (default: disabled)
    pub fn from_env() -> ApiResult<Self> {
        let bind_host = std::env::var("DOCCACHE_API_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("DOCCACHE_API_PORT").ok())
        {
            Some(port_str) => port_str.parse::<u16>().map_err(|_| {
                ApiError::invalid_input(format!("Invalid port value: {}", port_str))
            })?,
            None => DEFAULT_PORT,
        };

        let seed_interval = std::env::var("DOCCACHE_SEED_INTERVAL_MS")
            .ok()
            .and_then(|s| match s.trim().parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    tracing::warn!(value = %s, "Ignoring unparsable DOCCACHE_SEED_INTERVAL_MS");
                    None
                }
            })
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Ok(Self {
            bind_host,
            port,
            seed_interval,
        })
    }

    /// Socket address to bind the listener to.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_addr() {
        let config = ApiConfig::default();
        let addr = config.bind_addr().expect("default address parses");
        assert_eq!(addr.port(), 8080);
        assert!(config.seed_interval.is_none());
    }

    #[test]
    fn test_invalid_bind_host() {
        let config = ApiConfig {
            bind_host: "not a host".to_string(),
            ..Default::default()
        };
        let err = config.bind_addr().expect_err("should reject");
        assert!(err.message.contains("not a host"));
    }
}
