//! Worker Roles - What a Worker Thread Does
//!
//! Each worker receives one [`Bootstrap`] message: its identity, its role
//! with the role's parameters, and the shared segment. The role is matched
//! once when the worker starts; after that the worker only talks to the
//! primitive.

use std::fmt;

use segsync::{CounterMode, RaceWindow, SegmentRef};
use serde::Serialize;

use crate::workload::WorkRange;

/// Role without parameters, used in names and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleKind {
    Reader,
    Writer,
    Participant,
    Incrementer,
}

impl RoleKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Participant => "participant",
            Self::Incrementer => "incrementer",
        }
    }
}

/// Stable identity of a worker within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WorkerId {
    pub kind: RoleKind,
    /// Index among workers of the same kind
    pub index: usize,
}

impl WorkerId {
    pub fn new(kind: RoleKind, index: usize) -> Self {
        Self { kind, index }
    }

    /// OS thread name
    pub fn thread_name(&self) -> String {
        format!("segsync-{}", self)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.name(), self.index)
    }
}

/// A worker's job, with the parameters that job needs
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerRole {
    /// Acquire read mode `operations` times, holding it for `hold`
    Reader { operations: u32, hold: WorkRange },

    /// Acquire write mode `operations` times, holding it for `hold`
    Writer { operations: u32, hold: WorkRange },

    /// Work, then arrive at the barrier, `phases` times
    Participant {
        index: usize,
        phases: u32,
        work: WorkRange,
    },

    /// Increment the counter(s) selected by `mode`, `increments` times each
    Incrementer {
        increments: u32,
        mode: CounterMode,
        race_window: RaceWindow,
    },
}

impl WorkerRole {
    pub fn kind(&self) -> RoleKind {
        match self {
            Self::Reader { .. } => RoleKind::Reader,
            Self::Writer { .. } => RoleKind::Writer,
            Self::Participant { .. } => RoleKind::Participant,
            Self::Incrementer { .. } => RoleKind::Incrementer,
        }
    }

    /// Operations this role performs when not terminated
    pub fn planned_operations(&self) -> u64 {
        match *self {
            Self::Reader { operations, .. } | Self::Writer { operations, .. } => operations as u64,
            Self::Participant { phases, .. } => phases as u64,
            Self::Incrementer {
                increments, mode, ..
            } => {
                let passes = mode.runs_regular() as u64 + mode.runs_atomic() as u64;
                increments as u64 * passes
            }
        }
    }
}

/// Everything a worker is handed at spawn time
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub worker: WorkerId,
    pub role: WorkerRole,
    pub segment: SegmentRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_id_names() {
        let id = WorkerId::new(RoleKind::Writer, 3);
        assert_eq!(id.to_string(), "writer-3");
        assert_eq!(id.thread_name(), "segsync-writer-3");
    }

    #[test]
    fn test_planned_operations() {
        let role = WorkerRole::Incrementer {
            increments: 100,
            mode: CounterMode::Both,
            race_window: RaceWindow::None,
        };
        assert_eq!(role.kind(), RoleKind::Incrementer);
        assert_eq!(role.planned_operations(), 200);

        let role = WorkerRole::Participant {
            index: 0,
            phases: 7,
            work: WorkRange::NONE,
        };
        assert_eq!(role.planned_operations(), 7);
    }
}
