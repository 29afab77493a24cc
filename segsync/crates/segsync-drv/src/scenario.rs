//! Scenario Parameters
//!
//! One parameter set per demo, validated before any segment is allocated.

use std::time::Duration;

use segsync::{CounterMode, RaceWindow, SyncConfig};
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};
use crate::workload::WorkRange;

/// Reader-writer lock demo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RwLockParams {
    pub readers: usize,
    pub writers: usize,
    pub reads_per_reader: u32,
    pub writes_per_writer: u32,
    /// Time a reader holds read mode per operation
    pub read_hold: WorkRange,
    /// Time a writer holds write mode per operation
    pub write_hold: WorkRange,
}

impl Default for RwLockParams {
    fn default() -> Self {
        Self {
            readers: 4,
            writers: 2,
            reads_per_reader: 100,
            writes_per_writer: 50,
            read_hold: WorkRange::fixed(Duration::from_micros(500)),
            write_hold: WorkRange::fixed(Duration::from_millis(1)),
        }
    }
}

impl RwLockParams {
    pub fn validate(&self) -> Result<()> {
        if self.readers + self.writers == 0 {
            return Err(DriverError::InvalidParameters(
                "rwlock needs at least one reader or writer".to_string(),
            ));
        }
        let writes = self.writers as u64 * self.writes_per_writer as u64;
        if writes > i32::MAX as u64 {
            return Err(DriverError::InvalidParameters(format!(
                "{writes} writes overflow the sequence slot"
            )));
        }
        Ok(())
    }

    pub fn workers(&self) -> usize {
        self.readers + self.writers
    }

    pub fn expected_reads(&self) -> u64 {
        self.readers as u64 * self.reads_per_reader as u64
    }

    pub fn expected_writes(&self) -> u64 {
        self.writers as u64 * self.writes_per_writer as u64
    }
}

/// Barrier demo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierParams {
    pub workers: usize,
    pub phases: u32,
    /// Simulated work per participant per phase
    pub work: WorkRange,
}

impl Default for BarrierParams {
    fn default() -> Self {
        Self {
            workers: 4,
            phases: 5,
            work: WorkRange::from_millis(20, 30),
        }
    }
}

impl BarrierParams {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DriverError::InvalidParameters(
                "barrier needs at least one worker".to_string(),
            ));
        }
        if self.phases > i32::MAX as u32 {
            return Err(DriverError::InvalidParameters(format!(
                "{} phases overflow the phase slot",
                self.phases
            )));
        }
        Ok(())
    }
}

/// Counter demo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterParams {
    pub workers: usize,
    /// Increments per worker per counter
    pub increments: u32,
    pub mode: CounterMode,
    pub race_window: RaceWindow,
}

impl Default for CounterParams {
    fn default() -> Self {
        Self {
            workers: SyncConfig::default_workers(),
            increments: 10_000,
            mode: CounterMode::Both,
            race_window: RaceWindow::None,
        }
    }
}

impl CounterParams {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DriverError::InvalidParameters(
                "counter needs at least one worker".to_string(),
            ));
        }
        // PROGRESS counts every pass, so it is the largest slot
        if self.expected_progress() > i32::MAX as u64 {
            return Err(DriverError::InvalidParameters(format!(
                "{} increments overflow the progress slot",
                self.expected_progress()
            )));
        }
        Ok(())
    }

    /// Increments each selected counter should receive
    pub fn expected_per_counter(&self) -> u64 {
        self.workers as u64 * self.increments as u64
    }

    /// Increments recorded in PROGRESS across all selected counters
    pub fn expected_progress(&self) -> u64 {
        let passes = u64::from(self.mode.runs_regular()) + u64::from(self.mode.runs_atomic());
        self.expected_per_counter() * passes
    }
}
