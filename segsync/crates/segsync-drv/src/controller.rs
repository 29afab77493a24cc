//! Controller - Run Orchestration
//!
//! The controller owns everything a run needs besides the workers
//! themselves:
//!
//! 1. Allocate the primitive's segment
//! 2. Spawn one worker per role, each parked on the start gate
//! 3. Open the gate, drain progress until every worker is gone
//! 4. Join, aggregate, check invariants, report
//!
//! If any spawn fails, the gate is closed instead of opened: workers that
//! already exist return without touching the segment, and the run fails
//! with [`DriverError::Spawn`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use indexmap::IndexMap;
use segsync::stats::Timer;
use segsync::{
    AtomicCounter, ReaderWriterLock, ReusableBarrier, SharedSegment, SyncConfig, SyncError,
};

use crate::error::{DriverError, Result};
use crate::logging::{self, EventLog, SyncEvent};
use crate::progress::{self, Progress, DEFAULT_CAPACITY};
use crate::report::{BarrierReport, CounterReport, CounterResult, RwLockReport, WorkerOutcome};
use crate::role::{Bootstrap, RoleKind, WorkerId, WorkerRole};
use crate::scenario::{BarrierParams, CounterParams, RwLockParams};
use crate::worker::{self, RunStats, WorkerContext};

type Observer = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Cloneable handle that ends a run from another thread
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
}

impl StopHandle {
    /// Ask every worker to stop after its current operation
    pub fn terminate(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Runs the three demos
///
/// # Examples
///
/// ```rust,no_run
/// use segsync::SyncConfig;
/// use segsync_drv::{Controller, RwLockParams};
///
/// let controller = Controller::new(SyncConfig::default())?;
/// let report = controller.run_rwlock(&RwLockParams::default())?;
/// assert_eq!(report.total_writes, 100);
/// assert!(report.is_consistent());
/// # Ok::<(), segsync_drv::DriverError>(())
/// ```
pub struct Controller {
    config: SyncConfig,
    stop: Arc<AtomicBool>,
    events: Arc<EventLog>,
    observer: Option<Observer>,
    progress_capacity: usize,
}

/// What `execute` hands back to the scenario-specific aggregation
struct Execution {
    outcomes: IndexMap<WorkerId, WorkerOutcome>,
    elapsed: Duration,
    dropped: u64,
    terminated: bool,
}

impl Controller {
    /// Create a controller after checking the platform and the configuration
    ///
    /// # Errors
    /// - `Sync(Unsupported)` - no lock-free 32-bit atomics
    /// - `Sync(Configuration)` - invalid wait tuning
    pub fn new(config: SyncConfig) -> Result<Self> {
        SharedSegment::check_support()?;
        config.validate().map_err(SyncError::from)?;

        Ok(Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
            events: logging::global_event_log(),
            observer: None,
            progress_capacity: DEFAULT_CAPACITY,
        })
    }

    /// Record lifecycle events in `events` instead of the process-wide log
    pub fn with_event_log(mut self, events: Arc<EventLog>) -> Self {
        self.events = events;
        self
    }

    /// Call `observer` for every progress notification that arrives
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn with_progress_capacity(mut self, capacity: usize) -> Self {
        self.progress_capacity = capacity.max(1);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.events
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: Arc::clone(&self.stop),
        }
    }

    /// Stop the running demo, if any
    ///
    /// The flag stays raised, so later runs stop immediately until
    /// [`reset`](Self::reset) is called.
    pub fn terminate(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Lower the stop flag
    pub fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    /// Readers and writers sharing one value under the reader-writer lock
    pub fn run_rwlock(&self, params: &RwLockParams) -> Result<RwLockReport> {
        params.validate()?;
        let lock = ReaderWriterLock::allocate(&self.config)?;
        let stats = Arc::new(RunStats::new());

        let readers = (0..params.readers).map(|index| Bootstrap {
            worker: WorkerId::new(RoleKind::Reader, index),
            role: WorkerRole::Reader {
                operations: params.reads_per_reader,
                hold: params.read_hold,
            },
            segment: lock.segment().clone(),
        });
        let writers = (0..params.writers).map(|index| Bootstrap {
            worker: WorkerId::new(RoleKind::Writer, index),
            role: WorkerRole::Writer {
                operations: params.writes_per_writer,
                hold: params.write_hold,
            },
            segment: lock.segment().clone(),
        });

        let run = self.execute("rwlock", readers.chain(writers).collect(), &stats)?;
        let snapshot = lock.snapshot();

        let mut report = RwLockReport {
            readers: params.readers,
            writers: params.writers,
            total_reads: stats.reads.load(Ordering::SeqCst),
            total_writes: stats.writes.load(Ordering::SeqCst),
            final_value: snapshot.data,
            last_written: stats.last_written.load(Ordering::SeqCst),
            sequence: snapshot.sequence,
            max_concurrent_readers: stats.max_readers.load(Ordering::SeqCst),
            read_wait: stats.read_wait.summary(),
            write_wait: stats.write_wait.summary(),
            elapsed_ms: run.elapsed.as_secs_f64() * 1000.0,
            torn_reads: stats.torn_reads.load(Ordering::SeqCst),
            terminated: run.terminated,
            dropped_notifications: run.dropped,
            workers: run.outcomes.into_values().collect(),
            violations: Vec::new(),
        };
        report.check();

        self.finish("rwlock", &report.violations, run.elapsed);
        Ok(report)
    }

    /// Participants doing random work between barrier phases
    pub fn run_barrier(&self, params: &BarrierParams) -> Result<BarrierReport> {
        params.validate()?;
        let barrier = ReusableBarrier::allocate(params.workers, &self.config)?;
        let stats = Arc::new(RunStats::new());

        let participants = (0..params.workers)
            .map(|index| Bootstrap {
                worker: WorkerId::new(RoleKind::Participant, index),
                role: WorkerRole::Participant {
                    index,
                    phases: params.phases,
                    work: params.work,
                },
                segment: barrier.segment().clone(),
            })
            .collect();

        let run = self.execute("barrier", participants, &stats)?;

        let phase_times = stats.phase_times();
        for (phase, duration) in phase_times.iter().enumerate() {
            self.events.log(SyncEvent::PhaseComplete {
                phase: phase as u32,
                duration_ms: duration.as_secs_f64() * 1000.0,
            });
        }

        let phases_completed = barrier.phase() as u32;
        let avg_phase_ms = if phase_times.is_empty() {
            0.0
        } else {
            phase_times.iter().sum::<Duration>().as_secs_f64() * 1000.0 / phase_times.len() as f64
        };
        let elapsed_ns = u64::try_from(run.elapsed.as_nanos()).unwrap_or(u64::MAX);

        let mut report = BarrierReport {
            workers: params.workers,
            phases: params.phases,
            phases_completed,
            elapsed_ms: run.elapsed.as_secs_f64() * 1000.0,
            avg_phase_ms,
            wait: stats.phase_wait.summary(),
            total_work_ms: stats.work.sum() as f64 / 1_000_000.0,
            efficiency: BarrierReport::efficiency(stats.work.sum(), elapsed_ns, params.workers),
            participant_phases: barrier.participant_phases(),
            terminated: run.terminated,
            dropped_notifications: run.dropped,
            violations: Vec::new(),
        };
        report.check();

        self.finish("barrier", &report.violations, run.elapsed);
        Ok(report)
    }

    /// Workers racing on the regular and atomic counters
    pub fn run_counter(&self, params: &CounterParams) -> Result<CounterReport> {
        params.validate()?;
        let counter = AtomicCounter::allocate(&self.config)?;
        let stats = Arc::new(RunStats::new());

        let incrementers = (0..params.workers)
            .map(|index| Bootstrap {
                worker: WorkerId::new(RoleKind::Incrementer, index),
                role: WorkerRole::Incrementer {
                    increments: params.increments,
                    mode: params.mode,
                    race_window: params.race_window,
                },
                segment: counter.segment().clone(),
            })
            .collect();

        let run = self.execute("counter", incrementers, &stats)?;

        let regular = params.mode.runs_regular().then(|| {
            CounterResult::new(
                stats.regular_issued.load(Ordering::SeqCst),
                counter.regular_total(),
                stats.regular_elapsed.max(),
            )
        });
        let atomic = params.mode.runs_atomic().then(|| {
            CounterResult::new(
                stats.atomic_issued.load(Ordering::SeqCst),
                counter.atomic_total(),
                stats.atomic_elapsed.max(),
            )
        });

        let mut report = CounterReport {
            workers: params.workers,
            increments: params.increments,
            mode: params.mode,
            regular,
            atomic,
            terminated: run.terminated,
            violations: Vec::new(),
        };
        report.check();

        self.finish("counter", &report.violations, run.elapsed);
        Ok(report)
    }

    fn execute(
        &self,
        scenario: &str,
        bootstraps: Vec<Bootstrap>,
        stats: &Arc<RunStats>,
    ) -> Result<Execution> {
        let workers = bootstraps.len();
        self.events.log(SyncEvent::RunStart {
            scenario: scenario.to_string(),
            workers,
            wait_strategy: self.config.wait_strategy.name().to_string(),
        });

        let (progress_tx, progress_rx) = progress::channel(self.progress_capacity);
        let (gate, start) = crossbeam::channel::bounded(workers);
        let ctx = WorkerContext {
            stop: Arc::clone(&self.stop),
            halt: Arc::new(AtomicBool::new(false)),
            progress: progress_tx,
            stats: Arc::clone(stats),
            start,
        };

        let mut handles: Vec<(WorkerId, JoinHandle<WorkerOutcome>)> = Vec::with_capacity(workers);
        for bootstrap in bootstraps {
            let id = bootstrap.worker;
            match worker::spawn(bootstrap, ctx.clone()) {
                Ok(handle) => handles.push((id, handle)),
                Err(err) => {
                    log::warn!("[{scenario}] aborting run: {err}");
                    drop(gate);
                    drop(ctx);
                    // Closed gate: these return without running
                    for (_, handle) in handles {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
            }
        }
        drop(ctx);

        stats.start_phases();
        let timer = Timer::start();
        for _ in 0..handles.len() {
            // Fails only if every worker is already gone
            if gate.send(()).is_err() {
                break;
            }
        }
        drop(gate);

        for event in progress_rx.iter() {
            self.dispatch(&event);
        }

        let mut outcomes = IndexMap::with_capacity(handles.len());
        let mut panicked = None;
        for (id, handle) in handles {
            match handle.join() {
                Ok(outcome) => {
                    self.events.log(SyncEvent::WorkerComplete {
                        worker: id.to_string(),
                        operations: outcome.operations,
                        stopped_early: outcome.stopped_early,
                    });
                    outcomes.insert(id, outcome);
                }
                Err(_) => {
                    log::error!("[{scenario}] {id} panicked");
                    panicked.get_or_insert(DriverError::WorkerPanicked {
                        worker: id.to_string(),
                    });
                }
            }
        }
        let elapsed = timer.elapsed();

        if let Some(err) = panicked {
            return Err(err);
        }

        let terminated = self.is_terminated();
        if terminated {
            self.events.log(SyncEvent::Terminated {
                scenario: scenario.to_string(),
            });
        }

        let dropped = progress_rx.dropped();
        if dropped > 0 {
            log::debug!("[{scenario}] {dropped} progress notifications dropped");
        }

        Ok(Execution {
            outcomes,
            elapsed,
            dropped,
            terminated,
        })
    }

    fn dispatch(&self, event: &Progress) {
        if let Progress::Started { worker } = event {
            self.events.log(SyncEvent::WorkerStart {
                worker: worker.to_string(),
            });
        }
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    fn finish<V: fmt::Display>(&self, scenario: &str, violations: &[V], elapsed: Duration) {
        self.events.log(SyncEvent::ConsistencyCheck {
            scenario: scenario.to_string(),
            passed: violations.is_empty(),
            violations: violations.iter().map(ToString::to_string).collect(),
        });
        self.events.log(SyncEvent::RunEnd {
            scenario: scenario.to_string(),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
        });
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("terminated", &self.is_terminated())
            .field("observer", &self.observer.is_some())
            .field("progress_capacity", &self.progress_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::EventLogConfig;
    use crate::workload::WorkRange;
    use segsync::CounterMode;
    use std::sync::atomic::AtomicUsize;

    fn controller() -> Controller {
        Controller::new(SyncConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SyncConfig {
            park_timeout_us: 0,
            ..Default::default()
        };
        assert!(matches!(
            Controller::new(config),
            Err(DriverError::Sync(SyncError::Configuration(_)))
        ));
    }

    #[test]
    fn test_invalid_params_rejected_before_spawn() {
        let controller = controller().with_event_log(Arc::new(EventLog::default()));
        let params = BarrierParams {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            controller.run_barrier(&params),
            Err(DriverError::InvalidParameters(_))
        ));
        assert_eq!(controller.event_log().event_count(), 0);
    }

    #[test]
    fn test_small_rwlock_run() {
        let controller = controller();
        let params = RwLockParams {
            readers: 2,
            writers: 1,
            reads_per_reader: 10,
            writes_per_writer: 5,
            read_hold: WorkRange::NONE,
            write_hold: WorkRange::NONE,
        };
        let report = controller.run_rwlock(&params).unwrap();
        assert_eq!(report.total_reads, 20);
        assert_eq!(report.total_writes, 5);
        assert_eq!(report.sequence, 5);
        assert_eq!(report.final_value, 5);
        assert!(report.is_consistent());
        assert_eq!(report.workers.len(), 3);
    }

    #[test]
    fn test_default_sink_is_global_log() {
        let controller = controller();
        assert!(Arc::ptr_eq(
            controller.event_log(),
            &logging::global_event_log()
        ));
    }

    #[test]
    fn test_observer_sees_every_start() {
        let started = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&started);
        let controller = controller().with_observer(move |event| {
            if matches!(event, Progress::Started { .. }) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        let params = CounterParams {
            workers: 3,
            increments: 100,
            mode: CounterMode::Atomic,
            ..Default::default()
        };
        let report = controller.run_counter(&params).unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 3);
        assert_eq!(report.atomic.unwrap().total, 300);
        assert!(report.regular.is_none());
    }

    #[test]
    fn test_terminated_before_start_runs_nothing() {
        let controller = controller();
        controller.terminate();
        let params = CounterParams {
            workers: 2,
            increments: 1000,
            ..Default::default()
        };
        let report = controller.run_counter(&params).unwrap();
        assert!(report.terminated);
        assert_eq!(report.atomic.unwrap().total, 0);
        assert!(report.is_consistent());

        controller.reset();
        assert!(!controller.stop_handle().is_terminated());
    }

    #[test]
    fn test_event_log_lifecycle() {
        let log = Arc::new(EventLog::new(EventLogConfig {
            level: crate::logging::LogLevel::Debug,
            ..Default::default()
        }));
        let controller = controller().with_event_log(Arc::clone(&log));
        let params = BarrierParams {
            workers: 2,
            phases: 3,
            work: WorkRange::NONE,
        };
        controller.run_barrier(&params).unwrap();

        let events = log.events();
        assert!(matches!(events.first(), Some(SyncEvent::RunStart { workers: 2, .. })));
        assert!(matches!(events.last(), Some(SyncEvent::RunEnd { .. })));
        let phases = events
            .iter()
            .filter(|e| matches!(e, SyncEvent::PhaseComplete { .. }))
            .count();
        assert_eq!(phases, 3);
    }
}
