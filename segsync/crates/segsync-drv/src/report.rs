//! Run Reports
//!
//! Final numbers for each demo, plus the invariants checked against them.
//! A violation is reported as data; the caller decides what a failed check
//! means.

use std::fmt;

use segsync::stats::Summary;
use segsync::CounterMode;
use serde::Serialize;

use crate::role::WorkerId;

/// A broken invariant detected after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyViolation {
    /// SEQUENCE differs from the number of completed writes
    SequenceMismatch { sequence: i64, writes: u64 },

    /// SHARED_DATA differs from the value the last writer stored
    FinalValueMismatch { final_value: i32, last_written: i32 },

    /// Readers observed a writer's intermediate value
    TornReads { count: u64 },

    /// A participant completed a different number of phases than the rest
    PhaseCountMismatch {
        participant: usize,
        completed: u32,
        expected: u32,
    },

    /// The atomic counter lost or invented increments
    AtomicCountMismatch { expected: u64, actual: i64 },
}

impl fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SequenceMismatch { sequence, writes } => {
                write!(f, "sequence {sequence} != {writes} completed writes")
            }
            Self::FinalValueMismatch {
                final_value,
                last_written,
            } => write!(f, "final value {final_value} != last written {last_written}"),
            Self::TornReads { count } => write!(f, "{count} torn reads"),
            Self::PhaseCountMismatch {
                participant,
                completed,
                expected,
            } => write!(
                f,
                "participant {participant} completed {completed} phases, expected {expected}"
            ),
            Self::AtomicCountMismatch { expected, actual } => {
                write!(f, "atomic counter {actual} != {expected} increments")
            }
        }
    }
}

/// Per-worker result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerOutcome {
    pub worker: WorkerId,
    pub operations: u64,
    pub planned: u64,
    pub stopped_early: bool,
}

fn ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}

/// Reader-writer lock demo results
#[derive(Debug, Clone, Serialize)]
pub struct RwLockReport {
    pub readers: usize,
    pub writers: usize,
    pub total_reads: u64,
    pub total_writes: u64,
    pub final_value: i32,
    pub last_written: i32,
    pub sequence: i32,
    pub max_concurrent_readers: u32,
    pub read_wait: Summary,
    pub write_wait: Summary,
    pub elapsed_ms: f64,
    pub torn_reads: u64,
    pub terminated: bool,
    pub dropped_notifications: u64,
    pub workers: Vec<WorkerOutcome>,
    pub violations: Vec<ConsistencyViolation>,
}

impl RwLockReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// Compare lock slots against what the workers did
    pub(crate) fn check(&mut self) {
        let mut violations = Vec::new();

        if self.sequence as i64 != self.total_writes as i64 {
            violations.push(ConsistencyViolation::SequenceMismatch {
                sequence: self.sequence as i64,
                writes: self.total_writes,
            });
        }
        if self.final_value != self.last_written {
            violations.push(ConsistencyViolation::FinalValueMismatch {
                final_value: self.final_value,
                last_written: self.last_written,
            });
        }
        if self.torn_reads > 0 {
            violations.push(ConsistencyViolation::TornReads {
                count: self.torn_reads,
            });
        }

        self.violations = violations;
    }
}

impl fmt::Display for RwLockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reader-writer lock: {} readers, {} writers", self.readers, self.writers)?;
        writeln!(f, "  total reads:        {}", self.total_reads)?;
        writeln!(f, "  total writes:       {}", self.total_writes)?;
        writeln!(f, "  final value:        {}", self.final_value)?;
        writeln!(f, "  sequence:           {}", self.sequence)?;
        writeln!(f, "  max readers:        {}", self.max_concurrent_readers)?;
        writeln!(
            f,
            "  read wait:          avg {:.3}ms, max {:.3}ms",
            self.read_wait.mean_ms(),
            self.read_wait.max_ms()
        )?;
        writeln!(
            f,
            "  write wait:         avg {:.3}ms, max {:.3}ms",
            self.write_wait.mean_ms(),
            self.write_wait.max_ms()
        )?;
        writeln!(f, "  elapsed:            {:.3}s", self.elapsed_ms / 1000.0)?;
        writeln!(f, "  torn reads:         {}", self.torn_reads)?;
        write_consistency(f, self.terminated, &self.violations)
    }
}

/// Barrier demo results
#[derive(Debug, Clone, Serialize)]
pub struct BarrierReport {
    pub workers: usize,
    pub phases: u32,
    pub phases_completed: u32,
    pub elapsed_ms: f64,
    pub avg_phase_ms: f64,
    pub wait: Summary,
    pub total_work_ms: f64,
    /// Work time over elapsed time times workers, in `[0, 1]`
    pub efficiency: f64,
    pub participant_phases: Vec<u32>,
    pub terminated: bool,
    pub dropped_notifications: u64,
    pub violations: Vec<ConsistencyViolation>,
}

impl BarrierReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// Every participant must have completed exactly the phases the barrier
    /// completed, which is all of them unless terminated.
    pub(crate) fn check(&mut self) {
        let expected = if self.terminated {
            self.phases_completed
        } else {
            self.phases
        };

        self.violations = self
            .participant_phases
            .iter()
            .enumerate()
            .filter(|&(_, &completed)| completed != expected)
            .map(|(participant, &completed)| ConsistencyViolation::PhaseCountMismatch {
                participant,
                completed,
                expected,
            })
            .collect();
    }

    pub(crate) fn efficiency(total_work_ns: u64, elapsed_ns: u64, workers: usize) -> f64 {
        let possible = elapsed_ns as f64 * workers as f64;
        if possible == 0.0 {
            0.0
        } else {
            (total_work_ns as f64 / possible).min(1.0)
        }
    }
}

impl fmt::Display for BarrierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Barrier: {} workers, {} phases", self.workers, self.phases)?;
        writeln!(f, "  phases completed:   {}", self.phases_completed)?;
        writeln!(f, "  elapsed:            {:.3}s", self.elapsed_ms / 1000.0)?;
        writeln!(f, "  avg phase time:     {:.2}ms", self.avg_phase_ms)?;
        writeln!(f, "  avg wait:           {:.2}ms", self.wait.mean_ms())?;
        writeln!(f, "  max wait:           {:.2}ms", self.wait.max_ms())?;
        writeln!(f, "  total work:         {:.2}s", self.total_work_ms / 1000.0)?;
        writeln!(f, "  efficiency:         {:.1}%", self.efficiency * 100.0)?;
        write_consistency(f, self.terminated, &self.violations)
    }
}

/// One counter's outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CounterResult {
    pub expected: u64,
    pub total: i64,
    pub lost: i64,
    pub elapsed_ms: f64,
}

impl CounterResult {
    pub(crate) fn new(expected: u64, total: i32, slowest_ns: u64) -> Self {
        let total = total as i64;
        Self {
            expected,
            total,
            lost: expected as i64 - total,
            elapsed_ms: ms(slowest_ns),
        }
    }
}

/// Counter demo results
#[derive(Debug, Clone, Serialize)]
pub struct CounterReport {
    pub workers: usize,
    pub increments: u32,
    pub mode: CounterMode,
    pub regular: Option<CounterResult>,
    pub atomic: Option<CounterResult>,
    pub terminated: bool,
    pub violations: Vec<ConsistencyViolation>,
}

impl CounterReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// Only the atomic counter is held to exactness
    pub(crate) fn check(&mut self) {
        self.violations = self
            .atomic
            .iter()
            .filter(|r| r.lost != 0)
            .map(|r| ConsistencyViolation::AtomicCountMismatch {
                expected: r.expected,
                actual: r.total,
            })
            .collect();
    }
}

impl fmt::Display for CounterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Counter: {} workers x {} increments",
            self.workers, self.increments
        )?;
        for (name, result) in [("regular", &self.regular), ("atomic", &self.atomic)] {
            if let Some(r) = result {
                writeln!(
                    f,
                    "  {name:<8} {:>10} / {:<10} lost {:<8} {:.2}ms",
                    r.total, r.expected, r.lost, r.elapsed_ms
                )?;
            }
        }
        write_consistency(f, self.terminated, &self.violations)
    }
}

fn write_consistency(
    f: &mut fmt::Formatter<'_>,
    terminated: bool,
    violations: &[ConsistencyViolation],
) -> fmt::Result {
    if terminated {
        writeln!(f, "  terminated early:   partial counts")?;
    }
    if violations.is_empty() {
        writeln!(f, "  consistency:        PASS")
    } else {
        writeln!(f, "  consistency:        FAIL")?;
        for v in violations {
            writeln!(f, "    - {v}")?;
        }
        Ok(())
    }
}
