//! Executor and session configuration
//!
//! Both structs deserialize from TOML with every field optional:
//!
//! ```toml
//! default_cache_reset = "none"
//! cache_steps = ["tokenize"]
//! uncached_steps = ["download"]
//!
//! [executor]
//! strategy = "breadth_first"
//! max_concurrency = 4
//! failure_policy = "continue"
//! locking = true
//! codec = "bincode"
//! timeout_ms = 60000
//!
//! [executor.lock_retry]
//! max_attempts = 100
//! initial_delay_ms = 5
//! max_delay_ms = 200
//! backoff_multiplier = 1.5
//! ```

use crate::cache::{CacheReset, CacheRule};
use crate::core::{Codec, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How paths are evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Each path walks back from its targets and computes only what is
    /// missing; paths run concurrently
    #[default]
    DepthFirst,
    /// Layer by layer in topological order, each distinct prefix computed
    /// once per layer
    BreadthFirst,
    /// Targets are read from the cache only; nothing is computed
    CacheOnly,
}

/// What happens to the rest of a call when one path fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the call with the first error
    #[default]
    FailFast,
    /// Record the error on the failing paths and finish the others
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub strategy: Strategy,
    /// Transforms running at once; 1 runs them inline on the caller's task
    pub max_concurrency: usize,
    /// Dispatch paths in random order when running concurrently
    pub shuffle: bool,
    pub failure_policy: FailurePolicy,
    /// Take a per-key cache lock before computing an eligible value
    pub locking: bool,
    /// Waiting schedule while another worker holds a lock
    pub lock_retry: RetryPolicy,
    pub codec: Codec,
    pub timeout_ms: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::DepthFirst,
            max_concurrency: 1,
            shuffle: true,
            failure_policy: FailurePolicy::FailFast,
            locking: false,
            lock_retry: RetryPolicy::LOCK_WAIT,
            codec: Codec::Json,
            timeout_ms: None,
        }
    }
}

impl ExecutorConfig {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_locking(mut self, locking: bool) -> Self {
        self.locking = locking;
        self
    }

    pub fn with_lock_retry(mut self, policy: RetryPolicy) -> Self {
        self.lock_retry = policy;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.lock_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "lock_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read(path.as_ref())?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub executor: ExecutorConfig,
    /// Reset applied when a call does not choose one
    pub default_cache_reset: CacheReset,
    /// Text-named steps whose every option is cache-eligible in every call
    pub cache_steps: Vec<String>,
    /// Text-named steps never cached, even as targets
    pub uncached_steps: Vec<String>,
}

impl SessionConfig {
    pub fn cache_rules(&self) -> Vec<CacheRule> {
        self.cache_steps
            .iter()
            .map(|step| CacheRule::step(step.as_str()))
            .collect()
    }

    pub fn cache_exclude_rules(&self) -> Vec<CacheRule> {
        self.uncached_steps
            .iter()
            .map(|step| CacheRule::step(step.as_str()))
            .collect()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.executor.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read(path.as_ref())?)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
