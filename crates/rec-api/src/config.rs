//! Environment-driven configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `RECOMMENDER_LISTEN`, default `0.0.0.0:5000`.
    pub listen: SocketAddr,
    /// `RECOMMENDER_MODEL_DIR`, default `models`.
    pub model_dir: PathBuf,
    /// `RECOMMENDER_LOCK_DIR`, defaults to the model dir so lock files sit next to models.
    pub lock_dir: PathBuf,
    /// `RECOMMENDER_LOCK_TIMEOUT_MS`, default 1000. Only used by synchronous training.
    pub lock_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_raw = lookup("RECOMMENDER_LISTEN").unwrap_or_else(|| "0.0.0.0:5000".to_string());
        let listen = listen_raw.parse::<SocketAddr>().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                var: "RECOMMENDER_LISTEN",
                value: listen_raw.clone(),
                reason: e.to_string(),
            }
        })?;
        let model_dir = PathBuf::from(
            lookup("RECOMMENDER_MODEL_DIR").unwrap_or_else(|| "models".to_string()),
        );
        let lock_dir = lookup("RECOMMENDER_LOCK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| model_dir.clone());
        let lock_timeout = match lookup("RECOMMENDER_LOCK_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(raw.parse().map_err(
                |e: std::num::ParseIntError| ConfigError::Invalid {
                    var: "RECOMMENDER_LOCK_TIMEOUT_MS",
                    value: raw.clone(),
                    reason: e.to_string(),
                },
            )?),
            None => Duration::from_millis(1000),
        };
        Ok(Self {
            listen,
            model_dir,
            lock_dir,
            lock_timeout,
        })
    }
}
