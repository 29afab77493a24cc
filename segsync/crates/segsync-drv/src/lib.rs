//! # Segsync Driver - Demo Controller and Worker Harness
//!
//! Runs the three segsync demos on real OS threads and reports what
//! happened:
//!
//! - **counter**: workers race on a regular and an atomic counter
//! - **rwlock**: readers and writers share one value under the lock
//! - **barrier**: participants do random work between phases
//!
//! ## Run Lifecycle
//!
//! ```text
//!  Controller                         Workers
//!  ──────────                         ───────
//!  validate params
//!  allocate segment
//!  spawn ───────────────────────────▶ park on start gate
//!  open gate ───────────────────────▶ run role
//!  drain progress ◀──────────────────  Progress (advisory, may drop)
//!  join ◀────────────────────────────  WorkerOutcome
//!  check invariants
//!  report
//! ```
//!
//! Correctness never depends on progress notifications: every number a
//! report is checked against is either read from the segment or
//! accumulated in shared atomics that cannot drop samples.
//!
//! ## Example
//!
//! ```rust,no_run
//! use segsync::SyncConfig;
//! use segsync_drv::{BarrierParams, Controller};
//!
//! let controller = Controller::new(SyncConfig::default())?;
//! let report = controller.run_barrier(&BarrierParams::default())?;
//! println!("{report}");
//! # Ok::<(), segsync_drv::DriverError>(())
//! ```

pub mod controller;
pub mod error;
pub mod logging;
pub mod progress;
pub mod report;
pub mod role;
pub mod scenario;
pub mod worker;
pub mod workload;

pub use controller::{Controller, StopHandle};
pub use error::{DriverError, Result};
pub use logging::{
    configure_event_log, global_event_log, EventLog, EventLogConfig, LogLevel, SyncEvent,
};
pub use progress::{Progress, ProgressReceiver, ProgressSender};
pub use report::{
    BarrierReport, ConsistencyViolation, CounterReport, CounterResult, RwLockReport,
    WorkerOutcome,
};
pub use role::{RoleKind, WorkerId, WorkerRole};
pub use scenario::{BarrierParams, CounterParams, RwLockParams};
pub use workload::WorkRange;
