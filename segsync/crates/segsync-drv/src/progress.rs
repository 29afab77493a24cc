//! Progress - Worker to Controller Notifications
//!
//! Workers report what they did over a bounded channel. Sending never
//! blocks: when the controller falls behind, notifications are dropped and
//! counted. Nothing that decides correctness travels over this channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use segsync::CounterMode;
use serde::Serialize;

use crate::role::WorkerId;

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 4096;

/// One notification from a worker
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Progress {
    Started {
        worker: WorkerId,
    },
    Read {
        worker: WorkerId,
        wait: Duration,
        readers: u32,
    },
    Write {
        worker: WorkerId,
        wait: Duration,
        value: i32,
    },
    BarrierReached {
        worker: WorkerId,
        phase: u32,
    },
    BarrierReleased {
        worker: WorkerId,
        phase: u32,
        is_leader: bool,
    },
    PhaseCompleted {
        worker: WorkerId,
        phase: u32,
        work: Duration,
        wait: Duration,
    },
    IncrementsCompleted {
        worker: WorkerId,
        mode: CounterMode,
        count: u32,
        elapsed: Duration,
    },
    Finished {
        worker: WorkerId,
        operations: u64,
        stopped_early: bool,
    },
}

impl Progress {
    pub fn worker(&self) -> WorkerId {
        match *self {
            Progress::Started { worker }
            | Progress::Read { worker, .. }
            | Progress::Write { worker, .. }
            | Progress::BarrierReached { worker, .. }
            | Progress::BarrierReleased { worker, .. }
            | Progress::PhaseCompleted { worker, .. }
            | Progress::IncrementsCompleted { worker, .. }
            | Progress::Finished { worker, .. } => worker,
        }
    }
}

/// Sending half handed to every worker
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Sender<Progress>,
    dropped: Arc<AtomicU64>,
}

impl ProgressSender {
    /// Send without blocking; a full or closed channel drops the notification
    pub fn send(&self, event: Progress) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Notifications dropped so far across all clones
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving half, drained by the controller
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: Receiver<Progress>,
    dropped: Arc<AtomicU64>,
}

impl ProgressReceiver {
    /// Blocks until every sender is gone
    pub fn iter(&self) -> channel::Iter<'_, Progress> {
        self.rx.iter()
    }

    pub fn try_iter(&self) -> channel::TryIter<'_, Progress> {
        self.rx.try_iter()
    }

    /// Notifications senders could not deliver
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Bounded progress channel
pub fn channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = channel::bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ProgressSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        ProgressReceiver { rx, dropped },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleKind;

    fn id() -> WorkerId {
        WorkerId::new(RoleKind::Reader, 0)
    }

    #[test]
    fn test_full_channel_drops() {
        let (tx, rx) = channel(1);
        tx.send(Progress::Started { worker: id() });
        tx.send(Progress::Started { worker: id() });
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.dropped(), 1);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_closed_channel_drops() {
        let (tx, rx) = channel(4);
        drop(rx);
        tx.send(Progress::Started { worker: id() });
        assert_eq!(tx.dropped(), 1);
    }

    #[test]
    fn test_iter_ends_with_senders() {
        let (tx, rx) = channel(4);
        let other = tx.clone();
        tx.send(Progress::Started { worker: id() });
        other.send(Progress::Started { worker: id() });
        drop(tx);
        drop(other);
        assert_eq!(rx.iter().count(), 2);
    }

    #[test]
    fn test_json_shape() {
        let event = Progress::BarrierReached {
            worker: WorkerId::new(RoleKind::Participant, 2),
            phase: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "barrier_reached");
        assert_eq!(json["phase"], 5);
        assert_eq!(json["worker"]["kind"], "participant");
        assert_eq!(event.worker().index, 2);
    }
}
