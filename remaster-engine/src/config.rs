//! remaster-engine configuration
//!
//! Loaded from an optional TOML file with CLI/env overrides applied in
//! main.rs. Defaults favor low-latency start (small window) and infrequent
//! re-processing (large interval).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP/SSE server binds to
    pub bind_addr: String,

    /// Root folder tracks may be registered from
    pub library_root: PathBuf,

    /// Seconds of audio each processing window covers
    pub chunk_duration_s: f64,

    /// Seconds between consecutive window starts; must not exceed
    /// `chunk_duration_s` (the difference is the crossfade overlap)
    pub chunk_interval_s: f64,

    /// Processed-chunk cache capacity, counted in chunks
    pub cache_capacity_chunks: usize,

    /// Global bound on simultaneous chunk-processing jobs
    pub max_concurrent_jobs: usize,

    /// Per-session outbound queue depth, counted in chunks. Producers
    /// suspend when the queue is full; the queue never grows.
    pub outbound_queue_chunks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5750".to_string(),
            library_root: PathBuf::from("."),
            chunk_duration_s: 15.0,
            chunk_interval_s: 10.0,
            cache_capacity_chunks: 64,
            max_concurrent_jobs: 4,
            outbound_queue_chunks: 4,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the boundary math cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !(self.chunk_duration_s.is_finite() && self.chunk_duration_s > 0.0) {
            return Err(Error::Config(format!(
                "chunk_duration_s must be positive, got {}",
                self.chunk_duration_s
            )));
        }
        if !(self.chunk_interval_s.is_finite() && self.chunk_interval_s > 0.0) {
            return Err(Error::Config(format!(
                "chunk_interval_s must be positive, got {}",
                self.chunk_interval_s
            )));
        }
        if self.chunk_interval_s > self.chunk_duration_s {
            return Err(Error::Config(format!(
                "chunk_interval_s ({}) exceeds chunk_duration_s ({})",
                self.chunk_interval_s, self.chunk_duration_s
            )));
        }
        if self.cache_capacity_chunks == 0 {
            return Err(Error::Config("cache_capacity_chunks must be nonzero".into()));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(Error::Config("max_concurrent_jobs must be nonzero".into()));
        }
        if self.outbound_queue_chunks == 0 {
            return Err(Error::Config("outbound_queue_chunks must be nonzero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn interval_longer_than_window_rejected() {
        let config = Config {
            chunk_duration_s: 10.0,
            chunk_interval_s: 15.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacities_rejected() {
        let config = Config {
            cache_capacity_chunks: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_concurrent_jobs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            outbound_queue_chunks: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
