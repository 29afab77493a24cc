//! Configuration Module - Wait Tuning Parameters
//!
//! Controls how blocked threads wait for a slot to change. The choice never
//! changes what the primitives guarantee, only how much CPU a waiting thread
//! burns and how quickly it notices a release.

use serde::{Deserialize, Serialize};

use crate::wait::WaitStrategy;

/// Configuration shared by every primitive built over one segment
///
/// # Examples
///
/// ```rust
/// use segsync::{SyncConfig, WaitStrategy};
///
/// // Default: spin briefly, then park on a condition variable
/// let config = SyncConfig::default();
/// assert!(config.validate().is_ok());
///
/// // Pure spinning, no kernel involvement
/// let config = SyncConfig {
///     wait_strategy: WaitStrategy::Spin,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How a blocked thread waits
    ///
    /// Default: spin-then-park
    pub wait_strategy: WaitStrategy,

    /// Spin iterations before a spin-then-park waiter parks
    ///
    /// Ignored by the other strategies.
    /// Default: 100
    pub spin_limit: u32,

    /// Upper bound on one park, in microseconds
    ///
    /// A parked thread re-checks its slot at least this often even without a
    /// wakeup. Must be > 0.
    /// Default: 1000
    pub park_timeout_us: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            wait_strategy: WaitStrategy::SpinThenPark,
            spin_limit: DEFAULT_SPIN_LIMIT,
            park_timeout_us: DEFAULT_PARK_TIMEOUT_US,
        }
    }
}

impl SyncConfig {
    /// Validate configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use segsync::{SyncConfig, WaitStrategy};
    ///
    /// let config = SyncConfig {
    ///     wait_strategy: WaitStrategy::SpinThenPark,
    ///     spin_limit: 0,
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_strategy == WaitStrategy::SpinThenPark && self.spin_limit == 0 {
            return Err(ConfigError::InvalidSpinLimit(
                "spin_limit must be > 0 for spin-then-park".to_string(),
            ));
        }

        if self.park_timeout_us == 0 {
            return Err(ConfigError::InvalidParkTimeout(
                "park_timeout_us must be > 0".to_string(),
            ));
        }

        if !self.wait_strategy.is_available() {
            return Err(ConfigError::UnavailableStrategy(format!(
                "{} is not available on this platform",
                self.wait_strategy
            )));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with:
    /// - SEGSYNC_WAIT_STRATEGY (`spin`, `spin-then-park`, `futex`)
    /// - SEGSYNC_SPIN_LIMIT
    /// - SEGSYNC_PARK_TIMEOUT_US
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables via `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(strategy) = lookup(ENV_WAIT_STRATEGY).and_then(|v| v.parse().ok()) {
            config.wait_strategy = strategy;
        }
        if let Some(limit) = lookup(ENV_SPIN_LIMIT).and_then(|v| v.trim().parse().ok()) {
            config.spin_limit = limit;
        }
        if let Some(us) = lookup(ENV_PARK_TIMEOUT_US).and_then(|v| v.trim().parse().ok()) {
            config.park_timeout_us = us;
        }

        config
    }

    /// Default worker count for demos: one per core, at least two
    pub fn default_workers() -> usize {
        num_cpus::get().max(2)
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid spin limit: {0}")]
    InvalidSpinLimit(String),

    #[error("Invalid park timeout: {0}")]
    InvalidParkTimeout(String),

    #[error("Unavailable wait strategy: {0}")]
    UnavailableStrategy(String),

    #[error("Unknown wait strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid participant count: {0}")]
    InvalidParticipants(String),
}

pub const ENV_WAIT_STRATEGY: &str = "SEGSYNC_WAIT_STRATEGY";
pub const ENV_SPIN_LIMIT: &str = "SEGSYNC_SPIN_LIMIT";
pub const ENV_PARK_TIMEOUT_US: &str = "SEGSYNC_PARK_TIMEOUT_US";

const DEFAULT_SPIN_LIMIT: u32 = 100;
const DEFAULT_PARK_TIMEOUT_US: u64 = 1000;
