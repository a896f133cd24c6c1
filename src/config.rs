//! Configuration types for modloc

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Persistence configuration (database location)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite database file (default: "./modloc.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Translation dispatch configuration (chunking, parallelism, memory hints)
///
/// Used as a nested sub-config within [`Config`]. These values are the
/// defaults baked into every [`TranslationContext`](crate::TranslationContext);
/// per-request overrides take precedence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Units submitted to the provider per request (default: 0)
    ///
    /// `0` lets the engine choose; the engine default is sequential dispatch
    /// (one unit per request), the safe choice when provider capabilities
    /// are unknown.
    #[serde(default)]
    pub units_per_batch: usize,

    /// Maximum number of batches executing concurrently (default: 2, minimum: 1)
    #[serde(default = "default_parallel_batches")]
    pub parallel_batches: usize,

    /// Skip translation-memory lookups when building contexts (default: false)
    #[serde(default)]
    pub skip_translation_memory: bool,

    /// Maximum translation-memory hints per context (default: 50)
    #[serde(default = "default_tm_hint_limit")]
    pub tm_hint_limit: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            units_per_batch: 0,
            parallel_batches: default_parallel_batches(),
            skip_translation_memory: false,
            tm_hint_limit: default_tm_hint_limit(),
        }
    }
}

/// Retry configuration for transient provider failures
///
/// Applies to individual provider calls inside a chunk. The batch-level retry
/// budget is a fixed bound ([`MAX_BATCH_RETRIES`](crate::MAX_BATCH_RETRIES)),
/// not configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 500 ms)
    #[serde(default = "default_initial_delay", with = "duration_millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Main configuration for TranslationEngine
///
/// Fields are organized into logical sub-configs:
/// - [`persistence`](PersistenceConfig) — database location
/// - [`translation`](TranslationConfig) — chunking, parallelism, memory hints
/// - [`retry`](RetryConfig) — transient provider-call retries
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Persistence configuration
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Translation dispatch configuration
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Transient provider-call retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Validate the configuration, returning the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.translation.parallel_batches < 1 {
            return Err(Error::Config {
                message: "parallel_batches must be at least 1".to_string(),
                key: Some("parallel_batches".to_string()),
            });
        }
        if self.retry.max_attempts < 1 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".to_string(),
                key: Some("max_attempts".to_string()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be at least 1.0".to_string(),
                key: Some("backoff_multiplier".to_string()),
            });
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(Error::Config {
                message: "initial_delay must not exceed max_delay".to_string(),
                key: Some("initial_delay".to_string()),
            });
        }
        Ok(())
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./modloc.db")
}

fn default_parallel_batches() -> usize {
    2
}

fn default_tm_hint_limit() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
