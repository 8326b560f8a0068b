//! Configuration for the lease/payment core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Core configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB.
    pub data_dir: PathBuf,

    /// Service name (used in log fields and metrics labels).
    pub service_name: String,

    /// Service version.
    pub service_version: String,

    /// RocksDB tuning.
    pub rocksdb: RocksDBConfig,

    /// Batching for ledger appends.
    pub batching: BatchingConfig,

    /// Retry engine defaults (spec §4.7).
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/lease-core"),
            service_name: "lease-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            batching: BatchingConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// RocksDB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB).
    pub write_buffer_size_mb: usize,

    /// Max write buffers.
    pub max_write_buffer_number: i32,

    /// Target file size (MB).
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush).
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger.
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics.
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 256,
            max_write_buffer_number: 4,
            target_file_size_mb: 256,
            max_background_jobs: 4,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: true,
        }
    }
}

/// Batching for ledger appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Maximum batch size (events).
    pub max_batch_size: usize,

    /// Batch timeout (milliseconds).
    pub batch_timeout_ms: u64,

    /// Enable batching.
    pub enabled: bool,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            batch_timeout_ms: 10,
            enabled: true,
        }
    }
}

/// Retry engine defaults (spec §4.7): exponential backoff with a cap, up
/// to a fixed attempt budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base delay, seconds.
    pub base_delay_secs: u64,

    /// Backoff multiplier applied per attempt.
    pub multiplier: u64,

    /// Maximum delay, seconds.
    pub max_delay_secs: u64,

    /// Maximum attempts before a payment is considered exhausted.
    pub max_attempts: u32,

    /// Jitter as a fraction of the computed delay (0.0 - 1.0).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 60,
            multiplier: 6,
            max_delay_secs: 86_400,
            max_attempts: 3,
            jitter_fraction: 0.10,
        }
    }
}

impl Config {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEASE_CORE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(v) = std::env::var("LEASE_CORE_MAX_ATTEMPTS") {
            if let Ok(n) = v.parse() {
                config.retry.max_attempts = n;
            }
        }

        Ok(config)
    }
}
