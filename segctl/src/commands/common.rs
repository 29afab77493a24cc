//! Common types and utilities for segctl commands.

use std::fmt;
use std::io::Write;

use clap::Args;
use segsync::{RaceWindow, SyncConfig, WaitStrategy};
use segsync_drv::{configure_event_log, Controller, EventLogConfig, LogLevel};
use serde::Serialize;

use crate::error::{CtlError, Result};

// ============================================================================
// Shared Flags
// ============================================================================

/// Flags every demo accepts.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Print the report as JSON instead of a text panel
    #[arg(long)]
    pub json: bool,

    /// How blocked threads wait (spin, spin-then-park, futex)
    #[arg(long)]
    pub wait_strategy: Option<WaitStrategy>,

    /// Echo lifecycle events to stderr
    #[arg(long)]
    pub events: bool,
}

/// Everything a demo command needs besides its own parameters.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub sync: SyncConfig,
    pub options: RunOptions,
    pub verbose: bool,
}

impl RunContext {
    /// Controller with the `--wait-strategy` override applied, logging into
    /// the process-wide event log configured from the run flags
    pub fn controller(&self) -> Result<Controller> {
        let mut sync = self.sync.clone();
        if let Some(strategy) = self.options.wait_strategy {
            sync.wait_strategy = strategy;
        }

        configure_event_log(EventLogConfig {
            level: if self.verbose {
                LogLevel::Debug
            } else {
                LogLevel::Info
            },
            console: self.options.events,
            json: self.options.json,
            timestamps: !self.options.json,
        });

        tracing::debug!(strategy = %sync.wait_strategy, "building controller");
        Ok(Controller::new(sync)?)
    }
}

// ============================================================================
// Argument Parsers
// ============================================================================

/// Parse `none`, `yield` or `spin:<iterations>`.
pub fn parse_race_window(s: &str) -> std::result::Result<RaceWindow, String> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(RaceWindow::None),
        "yield" => Ok(RaceWindow::Yield),
        other => other
            .strip_prefix("spin:")
            .and_then(|n| n.parse::<u32>().ok())
            .map(RaceWindow::Spin)
            .ok_or_else(|| format!("expected none, yield or spin:<n>, got '{s}'")),
    }
}

// ============================================================================
// Output
// ============================================================================

/// Print `report`, then turn any violations into an error.
pub fn emit<R>(report: &R, json: bool, violations: &[impl fmt::Display]) -> Result<()>
where
    R: Serialize + fmt::Display,
{
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, report)?;
        writeln!(out)?;
    } else {
        write!(out, "{report}")?;
    }
    out.flush()?;

    if violations.is_empty() {
        Ok(())
    } else {
        let joined: Vec<String> = violations.iter().map(ToString::to_string).collect();
        Err(CtlError::Inconsistent(joined.join("; ")))
    }
}

/// Reject a zero count before any thread is spawned.
pub fn require_positive(value: usize, what: &str) -> Result<()> {
    if value == 0 {
        return Err(CtlError::Validation(format!("{what} must be > 0")));
    }
    Ok(())
}
