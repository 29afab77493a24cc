//! Worker Threads - Role Execution
//!
//! One OS thread per worker. A worker is spawned parked on the start gate,
//! runs its role once the gate opens, and returns a [`WorkerOutcome`].
//!
//! ## Termination
//!
//! - Readers, writers and incrementers check the stop flag between
//!   operations and never stop while holding the lock.
//! - Barrier participants never consult the stop flag directly. The leader
//!   of each phase turns it into the shared halt flag before releasing the
//!   others, so every participant stops after the same phase and nobody is
//!   left waiting at the barrier.
//!
//! ## Torn Reads
//!
//! A writer stores [`TORN_MARKER`] first, holds the lock, then stores the
//! real value. A reader samples the data at the start and the end of its
//! hold; seeing the marker or a change means a writer ran during a read.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use segsync::stats::{Histogram, Timer};
use segsync::{
    AtomicCounter, BarrierParticipant, CounterMode, CounterSlot, ReaderWriterLock, ReusableBarrier,
};

use crate::error::{DriverError, Result};
use crate::progress::{Progress, ProgressSender};
use crate::report::WorkerOutcome;
use crate::role::{Bootstrap, WorkerId, WorkerRole};
use crate::workload::{simulate, WorkRange};

/// Intermediate value a writer leaves in the data slot while it holds the lock
pub const TORN_MARKER: i32 = i32::MIN;

/// Increments between stop-flag checks
const STOP_CHECK_INTERVAL: u32 = 256;

/// Measurements shared by all workers of one run
///
/// Unlike progress notifications these are never dropped.
pub(crate) struct RunStats {
    pub read_wait: Histogram,
    pub write_wait: Histogram,
    pub phase_wait: Histogram,
    pub work: Histogram,
    pub regular_elapsed: Histogram,
    pub atomic_elapsed: Histogram,

    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub max_readers: AtomicU32,
    pub torn_reads: AtomicU64,
    pub last_written: AtomicI32,
    pub regular_issued: AtomicU64,
    pub atomic_issued: AtomicU64,

    /// Start of the current barrier phase
    phase_mark: Mutex<Instant>,
    /// Duration of every completed phase, in phase order
    phase_times: Mutex<Vec<Duration>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            read_wait: Histogram::new(),
            write_wait: Histogram::new(),
            phase_wait: Histogram::new(),
            work: Histogram::new(),
            regular_elapsed: Histogram::new(),
            atomic_elapsed: Histogram::new(),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            max_readers: AtomicU32::new(0),
            torn_reads: AtomicU64::new(0),
            last_written: AtomicI32::new(0),
            regular_issued: AtomicU64::new(0),
            atomic_issued: AtomicU64::new(0),
            phase_mark: Mutex::new(Instant::now()),
            phase_times: Mutex::new(Vec::new()),
        }
    }

    /// Restart the phase clock; called when the gate opens
    pub fn start_phases(&self) {
        *self.phase_mark.lock() = Instant::now();
    }

    /// Close the current phase; only the phase leader calls this, after release
    fn mark_phase(&self) {
        let mut mark = self.phase_mark.lock();
        let now = Instant::now();
        self.phase_times.lock().push(now - *mark);
        *mark = now;
    }

    pub fn phase_times(&self) -> Vec<Duration> {
        self.phase_times.lock().clone()
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// What every worker of a run shares besides its segment
#[derive(Clone)]
pub(crate) struct WorkerContext {
    /// Raised by the controller to end the run early
    pub stop: Arc<AtomicBool>,
    /// Set by a barrier leader once `stop` is seen
    pub halt: Arc<AtomicBool>,
    pub progress: ProgressSender,
    pub stats: Arc<RunStats>,
    /// One token per worker; a closed channel means "do not run"
    pub start: Receiver<()>,
}

impl WorkerContext {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// The primitive a worker talks to, attached before the thread starts
enum Job {
    Reader {
        lock: ReaderWriterLock,
        operations: u32,
        hold: WorkRange,
    },
    Writer {
        lock: ReaderWriterLock,
        operations: u32,
        hold: WorkRange,
    },
    Participant {
        participant: BarrierParticipant,
        phases: u32,
        work: WorkRange,
    },
    Incrementer {
        counter: AtomicCounter,
        increments: u32,
        mode: CounterMode,
    },
}

impl Job {
    fn attach(bootstrap: Bootstrap) -> Result<Self> {
        let Bootstrap { role, segment, .. } = bootstrap;
        let job = match role {
            WorkerRole::Reader { operations, hold } => Job::Reader {
                lock: ReaderWriterLock::attach(segment)?,
                operations,
                hold,
            },
            WorkerRole::Writer { operations, hold } => Job::Writer {
                lock: ReaderWriterLock::attach(segment)?,
                operations,
                hold,
            },
            WorkerRole::Participant {
                index,
                phases,
                work,
            } => Job::Participant {
                participant: ReusableBarrier::attach(segment)?.participant(index)?,
                phases,
                work,
            },
            WorkerRole::Incrementer {
                increments,
                mode,
                race_window,
            } => Job::Incrementer {
                counter: AtomicCounter::attach(segment)?.with_race_window(race_window),
                increments,
                mode,
            },
        };
        Ok(job)
    }
}

/// Start a worker thread parked on the start gate
///
/// # Errors
/// - `Sync` - the segment does not fit the role
/// - `Spawn` - the OS refused the thread
pub(crate) fn spawn(bootstrap: Bootstrap, ctx: WorkerContext) -> Result<JoinHandle<WorkerOutcome>> {
    let worker = bootstrap.worker;
    let planned = bootstrap.role.planned_operations();
    let job = Job::attach(bootstrap)?;

    thread::Builder::new()
        .name(worker.thread_name())
        .spawn(move || {
            if ctx.start.recv().is_err() {
                return WorkerOutcome {
                    worker,
                    operations: 0,
                    planned,
                    stopped_early: true,
                };
            }

            ctx.progress.send(Progress::Started { worker });
            let operations = run(worker, job, &ctx);
            let stopped_early = operations < planned;
            ctx.progress.send(Progress::Finished {
                worker,
                operations,
                stopped_early,
            });

            WorkerOutcome {
                worker,
                operations,
                planned,
                stopped_early,
            }
        })
        .map_err(|source| DriverError::Spawn {
            worker: worker.to_string(),
            source,
        })
}

fn run(worker: WorkerId, job: Job, ctx: &WorkerContext) -> u64 {
    let mut rng = StdRng::from_entropy();

    match job {
        Job::Reader {
            lock,
            operations,
            hold,
        } => run_reader(worker, &lock, operations, &hold, &mut rng, ctx),
        Job::Writer {
            lock,
            operations,
            hold,
        } => run_writer(worker, &lock, operations, &hold, &mut rng, ctx),
        Job::Participant {
            participant,
            phases,
            work,
        } => run_participant(worker, &participant, phases, &work, &mut rng, ctx),
        Job::Incrementer {
            counter,
            increments,
            mode,
        } => run_incrementer(worker, &counter, increments, mode, ctx),
    }
}

fn run_reader(
    worker: WorkerId,
    lock: &ReaderWriterLock,
    operations: u32,
    hold: &WorkRange,
    rng: &mut StdRng,
    ctx: &WorkerContext,
) -> u64 {
    let mut completed = 0;

    for _ in 0..operations {
        if ctx.stopping() {
            break;
        }

        let timer = Timer::start();
        lock.acquire_read();
        let wait = timer.elapsed();

        let readers = lock.active_readers();
        let before = lock.read_data();
        simulate(hold.sample(rng));
        let after = lock.read_data();

        lock.release_read();

        if before == TORN_MARKER || before != after {
            ctx.stats.torn_reads.fetch_add(1, Ordering::Relaxed);
        }
        ctx.stats.read_wait.record_duration(wait);
        ctx.stats.max_readers.fetch_max(readers, Ordering::Relaxed);
        ctx.stats.reads.fetch_add(1, Ordering::Relaxed);
        ctx.progress.send(Progress::Read {
            worker,
            wait,
            readers,
        });
        completed += 1;
    }

    completed
}

fn run_writer(
    worker: WorkerId,
    lock: &ReaderWriterLock,
    operations: u32,
    hold: &WorkRange,
    rng: &mut StdRng,
    ctx: &WorkerContext,
) -> u64 {
    let mut completed = 0;

    for _ in 0..operations {
        if ctx.stopping() {
            break;
        }

        let timer = Timer::start();
        lock.acquire_write();
        let wait = timer.elapsed();

        let value = lock.read_data().wrapping_add(1);
        lock.write_data(TORN_MARKER);
        simulate(hold.sample(rng));
        lock.write_data(value);
        ctx.stats.last_written.store(value, Ordering::SeqCst);
        ctx.stats.writes.fetch_add(1, Ordering::SeqCst);

        lock.release_write();

        ctx.stats.write_wait.record_duration(wait);
        ctx.progress.send(Progress::Write {
            worker,
            wait,
            value,
        });
        completed += 1;
    }

    completed
}

fn run_participant(
    worker: WorkerId,
    participant: &BarrierParticipant,
    phases: u32,
    work: &WorkRange,
    rng: &mut StdRng,
    ctx: &WorkerContext,
) -> u64 {
    let mut completed = 0;

    for phase in 0..phases {
        let work_time = work.sample(rng);
        simulate(work_time);
        ctx.stats.work.record_duration(work_time);

        ctx.progress.send(Progress::BarrierReached { worker, phase });
        let timer = Timer::start();
        let result = participant.arrive_and_wait_with(|_| {
            if ctx.stopping() {
                ctx.halt.store(true, Ordering::SeqCst);
            }
        });
        let wait = timer.elapsed();

        // The next phase cannot close before this leader arrives again
        if result.is_leader {
            ctx.stats.mark_phase();
        }

        ctx.stats.phase_wait.record_duration(wait);
        ctx.progress.send(Progress::BarrierReleased {
            worker,
            phase: result.phase,
            is_leader: result.is_leader,
        });
        ctx.progress.send(Progress::PhaseCompleted {
            worker,
            phase: result.phase,
            work: work_time,
            wait,
        });
        completed += 1;

        if ctx.halt.load(Ordering::SeqCst) {
            break;
        }
    }

    completed
}

fn run_incrementer(
    worker: WorkerId,
    counter: &AtomicCounter,
    increments: u32,
    mode: CounterMode,
    ctx: &WorkerContext,
) -> u64 {
    let mut completed = 0;

    if mode.runs_regular() {
        let (count, elapsed) = increment_pass(counter, increments, ctx, |c| {
            c.increment_regular(CounterSlot::Regular);
        });
        ctx.stats.regular_issued.fetch_add(count as u64, Ordering::Relaxed);
        ctx.stats.regular_elapsed.record_duration(elapsed);
        ctx.progress.send(Progress::IncrementsCompleted {
            worker,
            mode: CounterMode::Regular,
            count,
            elapsed,
        });
        completed += count as u64;
    }

    if mode.runs_atomic() && !ctx.stopping() {
        let (count, elapsed) = increment_pass(counter, increments, ctx, |c| {
            c.increment_atomic(CounterSlot::Atomic);
        });
        ctx.stats.atomic_issued.fetch_add(count as u64, Ordering::Relaxed);
        ctx.stats.atomic_elapsed.record_duration(elapsed);
        ctx.progress.send(Progress::IncrementsCompleted {
            worker,
            mode: CounterMode::Atomic,
            count,
            elapsed,
        });
        completed += count as u64;
    }

    completed
}

/// Run up to `increments` increments; returns how many ran and how long
fn increment_pass<F>(
    counter: &AtomicCounter,
    increments: u32,
    ctx: &WorkerContext,
    increment: F,
) -> (u32, Duration)
where
    F: Fn(&AtomicCounter),
{
    let timer = Timer::start();
    let mut done = 0;

    while done < increments {
        if ctx.stopping() {
            break;
        }
        let chunk = STOP_CHECK_INTERVAL.min(increments - done);
        for _ in 0..chunk {
            increment(counter);
        }
        counter.record_progress(chunk as i32);
        done += chunk;
    }

    (done, timer.elapsed())
}
