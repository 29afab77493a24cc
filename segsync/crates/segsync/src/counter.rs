//! Atomic Counter - Lost-Update Demonstration
//!
//! Two counters side by side in one segment: one incremented with a single
//! atomic `fetch_add`, one with a separate load and store. Under contention
//! the second one loses updates; the first never does.
//!
//! ## Segment Layout
//!
//! ```text
//! [0] REGULAR   non-atomic control counter
//! [1] ATOMIC    fetch_add counter
//! [2] PROGRESS  increments completed across all workers (advisory)
//! ```

use std::thread;

use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::segment::{SegmentRef, SharedSegment};

/// Slot indices
pub mod slots {
    /// Counter incremented by load-then-store
    pub const REGULAR: usize = 0;
    /// Counter incremented by `fetch_add`
    pub const ATOMIC: usize = 1;
    /// Completed increments of either kind
    pub const PROGRESS: usize = 2;
}

/// Segment length of a counter
pub const COUNTER_SLOTS: usize = 3;

/// A slot that may be incremented from outside; PROGRESS is driver-owned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterSlot {
    Regular,
    Atomic,
}

impl CounterSlot {
    pub const fn index(self) -> usize {
        match self {
            Self::Regular => slots::REGULAR,
            Self::Atomic => slots::ATOMIC,
        }
    }
}

/// What to do between the load and the store of a regular increment
///
/// Real preemption makes lost updates likely on a multicore machine; the
/// window makes them near certain on any machine, including a single core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RaceWindow {
    /// Load and store back to back
    #[default]
    None,
    /// `thread::yield_now()` between load and store
    Yield,
    /// Spin this many iterations between load and store
    Spin(u32),
}

/// Which counter(s) a demo run exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CounterMode {
    Regular,
    Atomic,
    #[default]
    Both,
}

impl CounterMode {
    pub fn runs_regular(&self) -> bool {
        matches!(self, Self::Regular | Self::Both)
    }

    pub fn runs_atomic(&self) -> bool {
        matches!(self, Self::Atomic | Self::Both)
    }
}

impl std::str::FromStr for CounterMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "atomic" => Ok(Self::Atomic),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown counter mode '{other}'")),
        }
    }
}

/// Handle to a counter segment; clone one per worker
///
/// # Examples
///
/// ```rust
/// use segsync::{AtomicCounter, CounterSlot, SyncConfig};
///
/// let counter = AtomicCounter::allocate(&SyncConfig::default())?;
/// counter.increment_atomic(CounterSlot::Atomic);
/// counter.increment_regular(CounterSlot::Regular);
/// assert_eq!(counter.atomic_total(), 1);
/// assert_eq!(counter.regular_total(), 1);
/// # Ok::<(), segsync::SyncError>(())
/// ```
#[derive(Debug, Clone)]
pub struct AtomicCounter {
    segment: SegmentRef,
    race_window: RaceWindow,
}

impl AtomicCounter {
    /// Allocate a fresh three-slot counter segment
    pub fn allocate(config: &SyncConfig) -> Result<Self> {
        Self::attach(SharedSegment::allocate(COUNTER_SLOTS, config)?)
    }

    /// Use an existing segment as a counter
    pub fn attach(segment: SegmentRef) -> Result<Self> {
        segment.expect_len(COUNTER_SLOTS)?;
        Ok(Self {
            segment,
            race_window: RaceWindow::None,
        })
    }

    /// Set the gap between load and store of a regular increment
    pub fn with_race_window(mut self, window: RaceWindow) -> Self {
        self.race_window = window;
        self
    }

    pub fn segment(&self) -> &SegmentRef {
        &self.segment
    }

    /// Non-atomic increment: load, compute, store
    ///
    /// Negative control only. Concurrent callers overwrite each other's
    /// results. Returns the value written.
    pub fn increment_regular(&self, slot: CounterSlot) -> i32 {
        let cell = self.segment.slot(slot.index());
        let current = cell.load_plain();

        match self.race_window {
            RaceWindow::None => {}
            RaceWindow::Yield => thread::yield_now(),
            RaceWindow::Spin(spins) => {
                for _ in 0..spins {
                    std::hint::spin_loop();
                }
            }
        }

        let next = current.wrapping_add(1);
        cell.store_plain(next);
        next
    }

    /// Atomic increment, exactly `fetch_add(slot, 1)`
    ///
    /// Returns the previous value.
    #[inline]
    pub fn increment_atomic(&self, slot: CounterSlot) -> i32 {
        self.segment.fetch_add(slot.index(), 1)
    }

    /// Count `n` completed increments in the progress slot
    #[inline]
    pub fn record_progress(&self, n: i32) {
        self.segment.fetch_add(slots::PROGRESS, n);
    }

    pub fn regular_total(&self) -> i32 {
        self.segment.load(slots::REGULAR)
    }

    pub fn atomic_total(&self) -> i32 {
        self.segment.load(slots::ATOMIC)
    }

    pub fn progress(&self) -> i32 {
        self.segment.load(slots::PROGRESS)
    }

    /// Zero all three slots; only meaningful with no worker running
    pub fn reset(&self) {
        for slot in 0..COUNTER_SLOTS {
            self.segment.store(slot, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn counter() -> AtomicCounter {
        AtomicCounter::allocate(&SyncConfig::default()).unwrap()
    }

    #[test]
    fn test_single_thread_increments_agree() {
        let counter = counter();
        for _ in 0..1000 {
            counter.increment_regular(CounterSlot::Regular);
            counter.increment_atomic(CounterSlot::Atomic);
        }
        assert_eq!(counter.regular_total(), 1000);
        assert_eq!(counter.atomic_total(), 1000);
    }

    #[test]
    fn test_increment_atomic_returns_previous() {
        let counter = counter();
        assert_eq!(counter.increment_atomic(CounterSlot::Atomic), 0);
        assert_eq!(counter.increment_atomic(CounterSlot::Atomic), 1);
    }

    #[test]
    fn test_each_method_targets_the_slot_given() {
        let counter = counter();
        counter.increment_atomic(CounterSlot::Regular);
        counter.increment_regular(CounterSlot::Atomic);
        counter.increment_regular(CounterSlot::Atomic);
        assert_eq!(counter.segment().snapshot(), vec![1, 2, 0]);
        assert_eq!(CounterSlot::Regular.index(), slots::REGULAR);
        assert_eq!(CounterSlot::Atomic.index(), slots::ATOMIC);
    }

    #[test]
    fn test_race_window_keeps_single_thread_exact() {
        let counter = counter().with_race_window(RaceWindow::Spin(10));
        for _ in 0..10 {
            counter.increment_regular(CounterSlot::Regular);
        }
        assert_eq!(counter.regular_total(), 10);
    }

    #[test]
    fn test_attach_wrong_len() {
        let segment = SharedSegment::allocate(4, &SyncConfig::default()).unwrap();
        assert!(matches!(
            AtomicCounter::attach(segment),
            Err(SyncError::InvalidLayout { expected: 3, actual: 4 })
        ));
    }

    #[test]
    fn test_reset_and_progress() {
        let counter = counter();
        counter.increment_atomic(CounterSlot::Atomic);
        counter.record_progress(5);
        assert_eq!(counter.progress(), 5);
        counter.reset();
        assert_eq!(counter.segment().snapshot(), vec![0, 0, 0]);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Both".parse::<CounterMode>().unwrap(), CounterMode::Both);
        assert!(CounterMode::Regular.runs_regular());
        assert!(!CounterMode::Regular.runs_atomic());
        assert!("sometimes".parse::<CounterMode>().is_err());
    }
}
