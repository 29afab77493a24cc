//! Reusable Barrier - Sense-Reversing Rendezvous
//!
//! All `TOTAL` participants call [`ReusableBarrier::arrive_and_wait`] once per
//! phase; nobody returns until everybody has arrived. The last arrival (the
//! leader) resets `COUNT`, advances `PHASE` and flips `SENSE`, and the flip
//! releases everyone. Because waiters wait for the flag to differ from the
//! value they read on arrival rather than for a particular value, the same
//! slots serve every phase.
//!
//! ## Segment Layout
//!
//! ```text
//! [0]        COUNT   arrivals in the current phase
//! [1]        PHASE   phase currently being filled
//! [2]        TOTAL   participant count, fixed
//! [3]        SENSE   0/1, flips once per phase
//! [4 + 2i]           participant i: phases completed
//! [4 + 2i + 1]       participant i: last observed sense
//! ```
//!
//! ## Phase Cycle
//!
//! ```text
//! Idle(p) ──first arrival──▶ Filling ──last arrival──▶ Releasing ──▶ Idle(p+1)
//!                                        COUNT = 0
//!                                        PHASE += 1
//!                                        SENSE = 1 - SENSE
//! ```
//!
//! `COUNT` is reset before the flip, and nobody can arrive for `p + 1` before
//! observing the flip, so a phase-`p + 1` arrival is never counted into `p`.

use serde::Serialize;

use crate::config::{ConfigError, SyncConfig};
use crate::error::{Result, SyncError};
use crate::segment::{SegmentRef, SharedSegment};

/// Slot indices
pub mod slots {
    pub const COUNT: usize = 0;
    pub const PHASE: usize = 1;
    pub const TOTAL: usize = 2;
    pub const SENSE: usize = 3;
    /// First per-participant slot
    pub const WORKER_DATA_START: usize = 4;

    /// Phases-completed slot of participant `index`
    pub const fn phases_completed(index: usize) -> usize {
        WORKER_DATA_START + 2 * index
    }

    /// Last-observed-sense slot of participant `index`
    pub const fn last_sense(index: usize) -> usize {
        WORKER_DATA_START + 2 * index + 1
    }
}

/// Segment length of a barrier for `participants` participants
pub const fn barrier_slots(participants: usize) -> usize {
    slots::WORKER_DATA_START + 2 * participants
}

/// Outcome of one `arrive_and_wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BarrierWaitResult {
    /// Phase this call took part in
    pub phase: u32,
    /// True for exactly one caller per phase: the one that released the rest
    pub is_leader: bool,
    /// Sense value that released this phase
    pub sense: i32,
}

/// Point-in-time copy of the control slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BarrierState {
    pub count: i32,
    pub phase: i32,
    pub total: i32,
    pub sense: i32,
}

/// Sense-reversing barrier over a shared segment
///
/// Cheap to clone; every clone operates on the same segment.
///
/// # Examples
///
/// ```rust
/// use std::thread;
/// use segsync::{ReusableBarrier, SyncConfig};
///
/// let barrier = ReusableBarrier::allocate(3, &SyncConfig::default())?;
///
/// let handles: Vec<_> = (0..3)
///     .map(|i| {
///         let participant = barrier.participant(i).unwrap();
///         thread::spawn(move || {
///             for _ in 0..10 {
///                 participant.arrive_and_wait();
///             }
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// assert_eq!(barrier.phase(), 10);
/// assert_eq!(barrier.participant_phases(), vec![10, 10, 10]);
/// # Ok::<(), segsync::SyncError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReusableBarrier {
    segment: SegmentRef,
    /// Copy of `TOTAL`, which never changes after allocation
    total: i32,
}

impl ReusableBarrier {
    /// Allocate a barrier for `participants` participants in phase 0
    ///
    /// # Errors
    /// - `Configuration` - zero participants, or too many to count in a slot
    pub fn allocate(participants: usize, config: &SyncConfig) -> Result<Self> {
        let total = Self::checked_total(participants)?;
        let segment = SharedSegment::allocate(barrier_slots(participants), config)?;
        segment.store(slots::TOTAL, total);
        Self::attach(segment)
    }

    /// Use an existing, initialized barrier segment
    pub fn attach(segment: SegmentRef) -> Result<Self> {
        let total = segment.cell(slots::TOTAL)?.load();
        if total <= 0 {
            return Err(ConfigError::InvalidParticipants(format!(
                "TOTAL slot holds {total}"
            ))
            .into());
        }
        segment.expect_len(barrier_slots(total as usize))?;
        Ok(Self { segment, total })
    }

    fn checked_total(participants: usize) -> Result<i32> {
        if participants == 0 {
            return Err(ConfigError::InvalidParticipants(
                "a barrier needs at least one participant".to_string(),
            )
            .into());
        }
        i32::try_from(participants)
            .ok()
            .filter(|&n| n <= (i32::MAX - slots::WORKER_DATA_START as i32) / 2)
            .ok_or_else(|| {
                ConfigError::InvalidParticipants(format!("{participants} participants is too many"))
                    .into()
            })
    }

    pub fn segment(&self) -> &SegmentRef {
        &self.segment
    }

    pub fn participants(&self) -> usize {
        self.total as usize
    }

    /// Phase currently being filled; equals the number of completed phases
    pub fn phase(&self) -> i32 {
        self.segment.load(slots::PHASE)
    }

    pub fn sense(&self) -> i32 {
        self.segment.load(slots::SENSE)
    }

    /// Arrivals so far in the current phase
    pub fn arrived(&self) -> i32 {
        self.segment.load(slots::COUNT)
    }

    /// Arrive for the current phase and wait for everyone else
    ///
    /// Must be called exactly once per participant per phase. A participant
    /// that never arrives stalls the others for good.
    pub fn arrive_and_wait(&self) -> BarrierWaitResult {
        self.arrive_and_wait_with(|_| {})
    }

    /// Like [`arrive_and_wait`](Self::arrive_and_wait), and the leader runs
    /// `on_release(phase)` while every other participant is still held.
    ///
    /// Whatever `on_release` stores is visible to all participants once they
    /// return, which makes it the place for collective decisions such as
    /// stopping after this phase.
    pub fn arrive_and_wait_with<F>(&self, on_release: F) -> BarrierWaitResult
    where
        F: FnOnce(u32),
    {
        let segment = &self.segment;

        let local_sense = segment.load(slots::SENSE);
        let phase = segment.load(slots::PHASE);
        let arrived = segment.fetch_add(slots::COUNT, 1) + 1;
        let release_sense = 1 - local_sense;

        let is_leader = arrived == self.total;
        if is_leader {
            on_release(phase as u32);
            segment.store(slots::COUNT, 0);
            segment.fetch_add(slots::PHASE, 1);
            segment.store(slots::SENSE, release_sense);
            segment.wake_all(slots::SENSE);
        } else {
            debug_assert!(arrived < self.total, "more arrivals than participants");
            while segment.load(slots::SENSE) == local_sense {
                segment.wait_while(slots::SENSE, local_sense);
            }
        }

        BarrierWaitResult {
            phase: phase as u32,
            is_leader,
            sense: release_sense,
        }
    }

    /// Handle for participant `index`, which also keeps its bookkeeping slots
    pub fn participant(&self, index: usize) -> Result<BarrierParticipant> {
        if index >= self.participants() {
            return Err(SyncError::InvalidParticipant {
                index,
                total: self.participants(),
            });
        }
        Ok(BarrierParticipant {
            barrier: self.clone(),
            index,
        })
    }

    /// Phases completed by each participant, in index order
    pub fn participant_phases(&self) -> Vec<u32> {
        (0..self.participants())
            .map(|i| self.segment.load(slots::phases_completed(i)) as u32)
            .collect()
    }

    pub fn state(&self) -> BarrierState {
        BarrierState {
            count: self.segment.load(slots::COUNT),
            phase: self.segment.load(slots::PHASE),
            total: self.segment.load(slots::TOTAL),
            sense: self.segment.load(slots::SENSE),
        }
    }
}

/// One participant's view of a barrier
#[derive(Debug, Clone)]
pub struct BarrierParticipant {
    barrier: ReusableBarrier,
    index: usize,
}

impl BarrierParticipant {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn barrier(&self) -> &ReusableBarrier {
        &self.barrier
    }

    /// Arrive, wait, then record the completed phase and observed sense
    pub fn arrive_and_wait(&self) -> BarrierWaitResult {
        self.arrive_and_wait_with(|_| {})
    }

    pub fn arrive_and_wait_with<F>(&self, on_release: F) -> BarrierWaitResult
    where
        F: FnOnce(u32),
    {
        let result = self.barrier.arrive_and_wait_with(on_release);
        let segment = self.barrier.segment();
        segment.store(slots::phases_completed(self.index), result.phase as i32 + 1);
        segment.store(slots::last_sense(self.index), result.sense);
        result
    }

    pub fn phases_completed(&self) -> u32 {
        self.barrier
            .segment()
            .load(slots::phases_completed(self.index)) as u32
    }

    pub fn last_sense(&self) -> i32 {
        self.barrier.segment().load(slots::last_sense(self.index))
    }
}
