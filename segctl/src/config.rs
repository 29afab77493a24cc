//! Configuration module for the segctl CLI.
//!
//! Default demo parameters live in `segctl.toml`, one section per demo plus
//! `[sync]` for wait tuning. Every field is optional. Precedence, lowest
//! first: built-in defaults, `SEGSYNC_*` environment variables (wait tuning
//! only), the file, command-line flags.
//!
//! ```toml
//! [sync]
//! wait_strategy = "spin-then-park"
//! spin_limit = 100
//!
//! [rwlock]
//! readers = 8
//! write_hold_us = 2000
//!
//! [counter]
//! mode = "both"
//! race_window = "yield"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::{config_dir, home_dir};
use segsync::{CounterMode, RaceWindow, SyncConfig, WaitStrategy};
use segsync_drv::{BarrierParams, CounterParams, RwLockParams, WorkRange};
use serde::{Deserialize, Serialize};

use crate::error::{CtlError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "segctl.toml";

/// Application configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Wait tuning shared by all demos.
    pub sync: SyncSection,
    pub counter: CounterConfig,
    pub rwlock: RwLockConfig,
    pub barrier: BarrierConfig,
}

/// `[sync]` section; keys left out fall back to the environment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_strategy: Option<WaitStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spin_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub park_timeout_us: Option<u64>,
}

impl SyncSection {
    /// Wait tuning with this section applied over `SEGSYNC_*` variables
    pub fn resolve(&self) -> SyncConfig {
        self.apply(SyncConfig::from_env())
    }

    fn apply(&self, mut base: SyncConfig) -> SyncConfig {
        if let Some(strategy) = self.wait_strategy {
            base.wait_strategy = strategy;
        }
        if let Some(limit) = self.spin_limit {
            base.spin_limit = limit;
        }
        if let Some(us) = self.park_timeout_us {
            base.park_timeout_us = us;
        }
        base
    }
}

/// `[counter]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CounterConfig {
    pub workers: usize,
    pub increments: u32,
    pub mode: CounterMode,
    pub race_window: RaceWindow,
}

/// `[rwlock]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RwLockConfig {
    pub readers: usize,
    pub writers: usize,
    pub reads_per_reader: u32,
    pub writes_per_writer: u32,
    pub read_hold_us: u64,
    pub write_hold_us: u64,
}

/// `[barrier]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BarrierConfig {
    pub workers: usize,
    pub phases: u32,
    /// Minimum work per phase, milliseconds
    pub work_ms: u64,
    /// Random extra work per phase, milliseconds
    pub work_variance_ms: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            workers: SyncConfig::default_workers(),
            increments: 10_000,
            mode: CounterMode::Both,
            race_window: RaceWindow::None,
        }
    }
}

impl Default for RwLockConfig {
    fn default() -> Self {
        Self {
            readers: 4,
            writers: 2,
            reads_per_reader: 100,
            writes_per_writer: 50,
            read_hold_us: 500,
            write_hold_us: 1000,
        }
    }
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            phases: 5,
            work_ms: 20,
            work_variance_ms: 30,
        }
    }
}

impl CounterConfig {
    pub fn params(&self) -> CounterParams {
        CounterParams {
            workers: self.workers,
            increments: self.increments,
            mode: self.mode,
            race_window: self.race_window,
        }
    }
}

impl RwLockConfig {
    pub fn params(&self) -> RwLockParams {
        RwLockParams {
            readers: self.readers,
            writers: self.writers,
            reads_per_reader: self.reads_per_reader,
            writes_per_writer: self.writes_per_writer,
            read_hold: WorkRange::fixed(Duration::from_micros(self.read_hold_us)),
            write_hold: WorkRange::fixed(Duration::from_micros(self.write_hold_us)),
        }
    }
}

impl BarrierConfig {
    pub fn params(&self) -> BarrierParams {
        BarrierParams {
            workers: self.workers,
            phases: self.phases,
            work: WorkRange::from_millis(self.work_ms, self.work_variance_ms),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Searches for configuration in the following order:
    /// 1. Current directory
    /// 2. `~/.config/segctl/`
    /// 3. System configuration directory
    ///
    /// Returns the default configuration if no config file is found.
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CtlError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    fn check_current_dir_config() -> Option<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    fn check_home_config() -> Option<PathBuf> {
        home_dir()
            .map(|dir| dir.join(".config").join("segctl").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn check_system_config() -> Option<PathBuf> {
        config_dir()
            .map(|dir| dir.join("segctl").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::check_current_dir_config()
            .or_else(Self::check_home_config)
            .or_else(Self::check_system_config)
    }
}
