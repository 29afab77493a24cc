//! Shared Segment - Fixed-Layout Block of Atomic Slots
//!
//! Every primitive keeps its whole state in one [`SharedSegment`]: a
//! fixed-length run of 32-bit slots allocated once by the controller and
//! handed to each worker as a [`SegmentRef`]. Nobody owns a slot; all
//! mutation goes through the atomic operations on [`AtomicCell`].
//!
//! ## Layout
//!
//! ```text
//! ┌────────┬────────┬────────┬─────┬──────────┐
//! │ slot 0 │ slot 1 │ slot 2 │ ... │ slot n-1 │   n fixed at allocation
//! └────────┴────────┴────────┴─────┴──────────┘
//!   i32      i32      i32            i32
//! ```
//!
//! Which slot means what is decided by the primitive built on top (see
//! `rwlock::slots`, `barrier::slots`, `counter::slots`).
//!
//! ## Memory Ordering
//!
//! Every atomic operation here is `SeqCst`: there is one global order of all
//! slot operations, consistent with each thread's program order. The lock and
//! barrier protocols are written against that model and nothing weaker.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use static_assertions::assert_eq_size;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::wait::Waiter;

/// Handle to a segment as given to every participant
pub type SegmentRef = Arc<SharedSegment>;

/// A single 32-bit slot with sequentially consistent atomic operations
///
/// `#[repr(transparent)]` over `AtomicI32`, so a segment is exactly a
/// contiguous array of `i32`.
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct AtomicCell(AtomicI32);

assert_eq_size!(AtomicCell, i32);

impl AtomicCell {
    /// Create a cell holding `value`
    pub const fn new(value: i32) -> Self {
        Self(AtomicI32::new(value))
    }

    /// Atomic load
    #[inline]
    pub fn load(&self) -> i32 {
        self.0.load(Ordering::SeqCst)
    }

    /// Atomic store
    #[inline]
    pub fn store(&self, value: i32) {
        self.0.store(value, Ordering::SeqCst);
    }

    /// Atomic add, returning the previous value
    ///
    /// Wraps on overflow.
    #[inline]
    pub fn fetch_add(&self, delta: i32) -> i32 {
        self.0.fetch_add(delta, Ordering::SeqCst)
    }

    /// Atomic compare-and-swap
    ///
    /// Returns `true` when the cell held `expected` and now holds `new`.
    #[inline]
    pub fn compare_and_swap(&self, expected: i32, new: i32) -> bool {
        self.compare_exchange(expected, new).is_ok()
    }

    /// Atomic compare-and-swap reporting the value actually seen on failure
    #[inline]
    pub fn compare_exchange(&self, expected: i32, new: i32) -> std::result::Result<i32, i32> {
        self.0
            .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
    }

    /// Unordered load for data protected by a lock
    ///
    /// No ordering of its own; the surrounding acquire/release supplies it.
    #[inline]
    pub(crate) fn load_plain(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Unordered store for data protected by a lock
    #[inline]
    pub(crate) fn store_plain(&self, value: i32) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Address of the slot, for futex syscalls
    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut i32 {
        self.0.as_ptr()
    }
}

/// Fixed-length block of atomic slots shared by every participant
///
/// Also carries the parking state used by the configured wait strategy, so
/// that every thread blocking on this segment waits on the same queue.
///
/// # Examples
///
/// ```rust
/// use segsync::{SharedSegment, SyncConfig};
///
/// let segment = SharedSegment::allocate(4, &SyncConfig::default())?;
/// segment.store(0, 7);
/// assert_eq!(segment.fetch_add(0, 1), 7);
/// assert!(segment.compare_and_swap(0, 8, 0));
/// assert_eq!(segment.load(0), 0);
/// # Ok::<(), segsync::SyncError>(())
/// ```
pub struct SharedSegment {
    cells: Box<[AtomicCell]>,
    waiter: Waiter,
}

impl SharedSegment {
    /// Allocate a zeroed segment of `slots` slots
    ///
    /// Checks the host once for atomic support and validates `config`.
    ///
    /// # Errors
    /// - `Unsupported` - no 32-bit atomics
    /// - `Configuration` - invalid wait configuration
    /// - `InvalidLayout` - zero slots requested
    pub fn allocate(slots: usize, config: &SyncConfig) -> Result<SegmentRef> {
        Self::check_support()?;
        config.validate()?;

        if slots == 0 {
            return Err(SyncError::InvalidLayout {
                expected: 1,
                actual: 0,
            });
        }

        let cells: Box<[AtomicCell]> = (0..slots).map(|_| AtomicCell::new(0)).collect();

        log::debug!(
            "allocated segment: {} slots, wait strategy {}",
            slots,
            config.wait_strategy
        );

        Ok(Arc::new(Self {
            cells,
            waiter: Waiter::new(config),
        }))
    }

    /// Verify the host provides native 32-bit atomics
    pub fn check_support() -> Result<()> {
        if cfg!(target_has_atomic = "32") {
            Ok(())
        } else {
            Err(SyncError::Unsupported(
                "target has no native 32-bit atomic operations".to_string(),
            ))
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false: allocation rejects empty segments
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Checked access to one slot
    pub fn cell(&self, index: usize) -> Result<&AtomicCell> {
        self.cells.get(index).ok_or(SyncError::SlotOutOfBounds {
            index,
            length: self.cells.len(),
        })
    }

    /// Unchecked-by-result slot access used by the primitives
    ///
    /// # Panics
    /// Panics if `index >= self.len()`. Primitives validate their layout at
    /// construction, so this only fires on a bug.
    #[inline]
    pub fn slot(&self, index: usize) -> &AtomicCell {
        &self.cells[index]
    }

    /// Atomic load of slot `index`
    #[inline]
    pub fn load(&self, index: usize) -> i32 {
        self.slot(index).load()
    }

    /// Atomic store to slot `index`
    #[inline]
    pub fn store(&self, index: usize, value: i32) {
        self.slot(index).store(value);
    }

    /// Atomic add on slot `index`, returning the previous value
    #[inline]
    pub fn fetch_add(&self, index: usize, delta: i32) -> i32 {
        self.slot(index).fetch_add(delta)
    }

    /// Atomic compare-and-swap on slot `index`
    #[inline]
    pub fn compare_and_swap(&self, index: usize, expected: i32, new: i32) -> bool {
        self.slot(index).compare_and_swap(expected, new)
    }

    /// Block while slot `index` still holds `observed`
    ///
    /// May return spuriously; callers re-check their condition in a loop.
    #[inline]
    pub fn wait_while(&self, index: usize, observed: i32) {
        self.waiter.wait(self.slot(index), observed);
    }

    /// Wake every thread blocked on slot `index`
    ///
    /// Call after the store that may unblock them.
    #[inline]
    pub fn wake_all(&self, index: usize) {
        self.waiter.wake_all(self.slot(index));
    }

    /// Copy of every slot, for observers and tests
    ///
    /// Each slot is read atomically, the snapshot as a whole is not.
    pub fn snapshot(&self) -> Vec<i32> {
        self.cells.iter().map(AtomicCell::load).collect()
    }

    /// Reject a segment whose length differs from `expected`
    pub(crate) fn expect_len(&self, expected: usize) -> Result<()> {
        if self.len() != expected {
            return Err(SyncError::InvalidLayout {
                expected,
                actual: self.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for SharedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSegment")
            .field("slots", &self.snapshot())
            .field("wait_strategy", &self.waiter.strategy())
            .finish()
    }
}
