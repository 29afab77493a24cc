//! Event Log - Run Lifecycle Events
//!
//! Records what happened during demo runs, for reports and debugging:
//! - Run start and end
//! - Worker start and completion
//! - Barrier phase completion
//! - Consistency check outcome
//!
//! Events are kept in memory with their timestamps and optionally echoed to
//! stderr, either human-readable or as one JSON object per line. Every event
//! is also forwarded to the `log` facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

/// Lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A scenario started
    RunStart {
        scenario: String,
        workers: usize,
        wait_strategy: String,
    },

    /// A worker thread began executing its role
    WorkerStart { worker: String },

    /// A worker returned
    WorkerComplete {
        worker: String,
        operations: u64,
        stopped_early: bool,
    },

    /// All participants passed a barrier phase
    PhaseComplete { phase: u32, duration_ms: f64 },

    /// The controller raised the stop flag
    Terminated { scenario: String },

    /// Post-run invariant check
    ConsistencyCheck {
        scenario: String,
        passed: bool,
        violations: Vec<String>,
    },

    /// A scenario finished
    RunEnd { scenario: String, duration_ms: f64 },
}

impl SyncEvent {
    fn level(&self) -> LogLevel {
        match self {
            SyncEvent::ConsistencyCheck { passed: false, .. } => LogLevel::Error,
            SyncEvent::Terminated { .. } => LogLevel::Warn,
            SyncEvent::RunStart { .. }
            | SyncEvent::RunEnd { .. }
            | SyncEvent::ConsistencyCheck { .. } => LogLevel::Info,
            SyncEvent::WorkerStart { .. }
            | SyncEvent::WorkerComplete { .. }
            | SyncEvent::PhaseComplete { .. } => LogLevel::Debug,
        }
    }

    /// One-line human-readable rendering
    pub fn describe(&self) -> String {
        match self {
            SyncEvent::RunStart {
                scenario,
                workers,
                wait_strategy,
            } => format!("[{scenario}] started with {workers} workers ({wait_strategy})"),
            SyncEvent::WorkerStart { worker } => format!("{worker} started"),
            SyncEvent::WorkerComplete {
                worker,
                operations,
                stopped_early,
            } => {
                if *stopped_early {
                    format!("{worker} stopped after {operations} operations")
                } else {
                    format!("{worker} completed {operations} operations")
                }
            }
            SyncEvent::PhaseComplete { phase, duration_ms } => {
                format!("phase {phase} complete ({duration_ms:.2}ms)")
            }
            SyncEvent::Terminated { scenario } => format!("[{scenario}] terminated"),
            SyncEvent::ConsistencyCheck {
                scenario,
                passed,
                violations,
            } => {
                if *passed {
                    format!("[{scenario}] consistency PASS")
                } else {
                    format!("[{scenario}] consistency FAIL: {}", violations.join("; "))
                }
            }
            SyncEvent::RunEnd {
                scenario,
                duration_ms,
            } => format!("[{scenario}] finished in {duration_ms:.2}ms"),
        }
    }
}

/// Event log configuration
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Most verbose level recorded
    pub level: LogLevel,

    /// Echo events to stderr
    pub console: bool,

    /// Echo as JSON lines instead of text
    pub json: bool,

    /// Prefix echoed events with a wall-clock timestamp
    pub timestamps: bool,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            json: false,
            timestamps: true,
        }
    }
}

/// Timestamped in-memory event log
pub struct EventLog {
    config: EventLogConfig,
    events: Mutex<Vec<(DateTime<Local>, SyncEvent)>>,
    enabled: AtomicBool,
}

impl EventLog {
    pub fn new(config: EventLogConfig) -> Self {
        Self {
            config,
            events: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Record an event if enabled and within the configured level
    pub fn log(&self, event: SyncEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = event.level();
        match level {
            LogLevel::Error => log::error!("{}", event.describe()),
            LogLevel::Warn => log::warn!("{}", event.describe()),
            LogLevel::Info => log::info!("{}", event.describe()),
            LogLevel::Debug => log::debug!("{}", event.describe()),
        }

        if level > self.config.level {
            return;
        }

        let now = Local::now();
        if self.config.console {
            eprintln!("{}", self.render(now, &event));
        }
        self.events.lock().push((now, event));
    }

    fn render(&self, at: DateTime<Local>, event: &SyncEvent) -> String {
        let body = if self.config.json {
            serde_json::to_string(event).unwrap_or_else(|_| event.describe())
        } else {
            event.describe()
        };

        if self.config.timestamps {
            format!("[{}] {}", at.format("%Y-%m-%d %H:%M:%S%.3f"), body)
        } else {
            body
        }
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Recorded events rendered one per line, as they would be echoed
    pub fn render_all(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|(at, e)| self.render(*at, e))
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(EventLogConfig::default())
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_LOG: Mutex<Arc<EventLog>> = Mutex::new(Arc::new(EventLog::default()));
}

/// The process-wide log, used by every controller not given its own
pub fn global_event_log() -> Arc<EventLog> {
    Arc::clone(&GLOBAL_LOG.lock())
}

/// Replace the process-wide log and return the new one
///
/// Controllers created earlier keep the log they already hold.
pub fn configure_event_log(config: EventLogConfig) -> Arc<EventLog> {
    let log = Arc::new(EventLog::new(config));
    *GLOBAL_LOG.lock() = Arc::clone(&log);
    log
}
