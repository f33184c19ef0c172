use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::scheduler::WorkerConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub workers: usize,
    pub claim_poll_interval: Duration,
    pub error_backoff_base: Duration,
    pub error_backoff_max: Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let listen_addr = parse(&lookup, "CLAIMD_LISTEN_ADDR", "127.0.0.1:8081")?;
        let log_level = lookup("CLAIMD_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let workers = parse(&lookup, "CLAIMD_WORKERS", "4")?;
        let claim_poll_interval =
            Duration::from_secs(parse(&lookup, "CLAIMD_CLAIM_POLL_INTERVAL_SECS", "5")?);
        let error_backoff_base =
            Duration::from_millis(parse(&lookup, "CLAIMD_ERROR_BACKOFF_BASE_MS", "100")?);
        let error_backoff_max =
            Duration::from_secs(parse(&lookup, "CLAIMD_ERROR_BACKOFF_MAX_SECS", "60")?);
        let shutdown_timeout =
            Duration::from_secs(parse(&lookup, "CLAIMD_SHUTDOWN_TIMEOUT_SECS", "10")?);

        Ok(Self {
            listen_addr,
            log_level,
            workers,
            claim_poll_interval,
            error_backoff_base,
            error_backoff_max,
            shutdown_timeout,
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            workers: self.workers,
            backoff_base: self.error_backoff_base,
            backoff_max: self.error_backoff_max,
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(name).unwrap_or_else(|| default.to_string());
    raw.parse()
        .with_context(|| format!("invalid {name}: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:8081");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.workers, 4);
        assert_eq!(config.claim_poll_interval, Duration::from_secs(5));
        assert_eq!(config.error_backoff_base, Duration::from_millis(100));
        assert_eq!(config.error_backoff_max, Duration::from_secs(60));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("CLAIMD_LISTEN_ADDR", "0.0.0.0:9000"),
            ("CLAIMD_WORKERS", "16"),
            ("CLAIMD_CLAIM_POLL_INTERVAL_SECS", "1"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.worker_config().workers, 16);
        assert_eq!(config.claim_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let err = config(&[("CLAIMD_WORKERS", "many")]).unwrap_err();
        assert!(err.to_string().contains("CLAIMD_WORKERS"));
    }
}
