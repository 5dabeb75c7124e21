//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server and coordination-layer configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL outbox store; in-memory when unset
/// - `RELAY_INTERVAL_SECS` — pause between relay ticks (default: 60)
/// - `RELAY_STARTUP_DELAY_SECS` — grace before the first tick (default: 60)
/// - `OUTBOX_RETRY_BUDGET_SECS` — delivery retry budget (default: 900)
/// - `DEDUP_TTL_SECS` — idempotency entry lifetime (default: 86400)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub relay_interval: Duration,
    pub relay_startup_delay: Duration,
    pub outbox_retry_budget: Duration,
    pub dedup_ttl: Duration,
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(default),
    )
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            relay_interval: env_secs("RELAY_INTERVAL_SECS", 60),
            relay_startup_delay: env_secs("RELAY_STARTUP_DELAY_SECS", 60),
            outbox_retry_budget: env_secs("OUTBOX_RETRY_BUDGET_SECS", 900),
            dedup_ttl: env_secs("DEDUP_TTL_SECS", 24 * 60 * 60),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            relay_interval: Duration::from_secs(60),
            relay_startup_delay: Duration::from_secs(60),
            outbox_retry_budget: Duration::from_secs(900),
            dedup_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.relay_interval, Duration::from_secs(60));
        assert_eq!(config.outbox_retry_budget, Duration::from_secs(900));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
