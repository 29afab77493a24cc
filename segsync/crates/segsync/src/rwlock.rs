//! Reader-Writer Lock - Writer-Priority Shared/Exclusive Access
//!
//! Any number of readers or exactly one writer, with the whole lock state in
//! a four-slot segment. A writer announces itself in `WAITING_WRITERS` before
//! it waits; from that moment no new reader is admitted, so a steady stream
//! of readers cannot starve it.
//!
//! ## Segment Layout
//!
//! ```text
//! [0] LOCK_STATE       0 unlocked, k > 0 k readers, -1 one writer
//! [1] WAITING_WRITERS  writers announced but not yet admitted
//! [2] SHARED_DATA      protected payload
//! [3] SEQUENCE         completed writes
//! ```
//!
//! ## State Machine
//!
//! ```text
//!              acquire_read (WAITING_WRITERS == 0)
//!   ┌──────────┐ ──────────────────────────────▶ ┌──────────┐
//!   │ Unlocked │                                 │ Read(k)  │ ◀─┐ acquire_read
//!   │    0     │ ◀────────────────────────────── │   k>0    │ ──┘ release_read
//!   └──────────┘      release_read (k == 1)      └──────────┘
//!     │     ▲
//!     │     │ release_write (SEQUENCE += 1, then state = 0)
//!     ▼     │
//!   ┌──────────┐
//!   │  Write   │
//!   │   -1     │
//!   └──────────┘
//! ```
//!
//! ## Fairness Bound
//!
//! Writer priority is checked before the reader's CAS, not atomically with
//! it. A reader that passed the `WAITING_WRITERS` check just before a writer
//! announced can still complete its CAS, so at most one admission per
//! concurrently arriving reader slips in ahead of a waiting writer. No reader
//! that starts its acquisition after the announcement gets in first.

use serde::Serialize;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::segment::{SegmentRef, SharedSegment};

/// Slot indices
pub mod slots {
    pub const LOCK_STATE: usize = 0;
    pub const WAITING_WRITERS: usize = 1;
    pub const SHARED_DATA: usize = 2;
    pub const SEQUENCE: usize = 3;
}

/// Segment length of a reader-writer lock
pub const RWLOCK_SLOTS: usize = 4;

/// `LOCK_STATE` value while a writer holds the lock
pub const WRITE_LOCKED: i32 = -1;

/// Decoded `LOCK_STATE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockMode {
    Unlocked,
    /// Number of active readers
    Read(u32),
    Write,
}

impl LockMode {
    /// Decode a raw state; `None` for values below `WRITE_LOCKED`
    pub fn from_state(state: i32) -> Option<Self> {
        match state {
            0 => Some(Self::Unlocked),
            WRITE_LOCKED => Some(Self::Write),
            k if k > 0 => Some(Self::Read(k as u32)),
            _ => None,
        }
    }
}

/// Point-in-time copy of the four lock slots
///
/// Slots are read one by one, so a snapshot taken while the lock is busy may
/// mix moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RwLockSnapshot {
    pub state: i32,
    pub waiting_writers: i32,
    pub data: i32,
    pub sequence: i32,
}

impl RwLockSnapshot {
    pub fn mode(&self) -> Option<LockMode> {
        LockMode::from_state(self.state)
    }
}

/// Writer-priority reader-writer lock over a shared segment
///
/// Cheap to clone; every clone operates on the same segment.
///
/// # Examples
///
/// ```rust
/// use segsync::{ReaderWriterLock, SyncConfig};
///
/// let lock = ReaderWriterLock::allocate(&SyncConfig::default())?;
///
/// {
///     let mut guard = lock.write();
///     guard.set(42);
/// }
///
/// let guard = lock.read();
/// assert_eq!(guard.get(), 42);
/// assert_eq!(lock.sequence(), 1);
/// # Ok::<(), segsync::SyncError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReaderWriterLock {
    segment: SegmentRef,
}

impl ReaderWriterLock {
    /// Allocate a fresh, unlocked lock
    pub fn allocate(config: &SyncConfig) -> Result<Self> {
        Self::attach(SharedSegment::allocate(RWLOCK_SLOTS, config)?)
    }

    /// Use an existing four-slot segment as a lock
    pub fn attach(segment: SegmentRef) -> Result<Self> {
        segment.expect_len(RWLOCK_SLOTS)?;
        Ok(Self { segment })
    }

    pub fn segment(&self) -> &SegmentRef {
        &self.segment
    }

    /// Block until admitted as a reader
    ///
    /// Waits while a writer holds the lock or any writer is waiting.
    pub fn acquire_read(&self) {
        let segment = &self.segment;
        loop {
            let state = segment.load(slots::LOCK_STATE);
            if state == WRITE_LOCKED {
                segment.wait_while(slots::LOCK_STATE, state);
                continue;
            }

            let waiting = segment.load(slots::WAITING_WRITERS);
            if waiting > 0 {
                segment.wait_while(slots::WAITING_WRITERS, waiting);
                continue;
            }

            if segment.compare_and_swap(slots::LOCK_STATE, state, state + 1) {
                return;
            }
        }
    }

    /// Leave read mode; never blocks
    ///
    /// The last reader out wakes waiting writers.
    pub fn release_read(&self) {
        let previous = self.segment.fetch_add(slots::LOCK_STATE, -1);
        debug_assert!(previous > 0, "release_read without a read lock");
        if previous == 1 {
            self.segment.wake_all(slots::LOCK_STATE);
        }
    }

    /// Block until admitted as the single writer
    pub fn acquire_write(&self) {
        let segment = &self.segment;
        segment.fetch_add(slots::WAITING_WRITERS, 1);

        loop {
            let state = segment.load(slots::LOCK_STATE);
            if state != 0 {
                segment.wait_while(slots::LOCK_STATE, state);
                continue;
            }
            if segment.compare_and_swap(slots::LOCK_STATE, 0, WRITE_LOCKED) {
                break;
            }
        }

        // Readers parked on the announcement re-check and then wait on
        // LOCK_STATE instead.
        segment.fetch_add(slots::WAITING_WRITERS, -1);
        segment.wake_all(slots::WAITING_WRITERS);
    }

    /// Leave write mode
    ///
    /// `SEQUENCE` is bumped before the lock reads as unlocked, so whoever
    /// acquires next sees the new sequence.
    pub fn release_write(&self) {
        debug_assert_eq!(
            self.segment.load(slots::LOCK_STATE),
            WRITE_LOCKED,
            "release_write without the write lock"
        );
        self.segment.fetch_add(slots::SEQUENCE, 1);
        self.segment.store(slots::LOCK_STATE, 0);
        self.segment.wake_all(slots::LOCK_STATE);
    }

    /// One non-blocking attempt to enter read mode
    ///
    /// Fails while a writer holds or waits for the lock.
    pub fn try_acquire_read(&self) -> bool {
        let state = self.segment.load(slots::LOCK_STATE);
        if state < 0 || self.segment.load(slots::WAITING_WRITERS) > 0 {
            return false;
        }
        self.segment
            .compare_and_swap(slots::LOCK_STATE, state, state + 1)
    }

    /// One non-blocking attempt to enter write mode
    ///
    /// Does not announce itself, so it can succeed ahead of writers that are
    /// already waiting.
    pub fn try_acquire_write(&self) -> bool {
        self.segment
            .compare_and_swap(slots::LOCK_STATE, 0, WRITE_LOCKED)
    }

    /// Acquire read mode for the lifetime of the guard
    pub fn read(&self) -> ReadGuard<'_> {
        self.acquire_read();
        ReadGuard { lock: self }
    }

    /// Acquire write mode for the lifetime of the guard
    pub fn write(&self) -> WriteGuard<'_> {
        self.acquire_write();
        WriteGuard { lock: self }
    }

    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        self.try_acquire_read().then(|| ReadGuard { lock: self })
    }

    pub fn try_write(&self) -> Option<WriteGuard<'_>> {
        self.try_acquire_write().then(|| WriteGuard { lock: self })
    }

    /// Read `SHARED_DATA`
    ///
    /// Only meaningful while holding read or write mode.
    #[inline]
    pub fn read_data(&self) -> i32 {
        self.segment.slot(slots::SHARED_DATA).load_plain()
    }

    /// Write `SHARED_DATA`
    ///
    /// Only legal while holding write mode; the surrounding release publishes
    /// the value.
    #[inline]
    pub fn write_data(&self, value: i32) {
        self.segment.slot(slots::SHARED_DATA).store_plain(value);
    }

    /// Completed writes so far
    pub fn sequence(&self) -> i32 {
        self.segment.load(slots::SEQUENCE)
    }

    pub fn waiting_writers(&self) -> i32 {
        self.segment.load(slots::WAITING_WRITERS)
    }

    pub fn mode(&self) -> Option<LockMode> {
        LockMode::from_state(self.segment.load(slots::LOCK_STATE))
    }

    /// Active readers right now; zero in write mode
    pub fn active_readers(&self) -> u32 {
        match self.mode() {
            Some(LockMode::Read(k)) => k,
            _ => 0,
        }
    }

    pub fn snapshot(&self) -> RwLockSnapshot {
        RwLockSnapshot {
            state: self.segment.load(slots::LOCK_STATE),
            waiting_writers: self.segment.load(slots::WAITING_WRITERS),
            data: self.segment.load(slots::SHARED_DATA),
            sequence: self.segment.load(slots::SEQUENCE),
        }
    }
}

/// Read mode held until drop
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a ReaderWriterLock,
}

impl ReadGuard<'_> {
    pub fn get(&self) -> i32 {
        self.lock.read_data()
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Write mode held until drop
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a ReaderWriterLock,
}

impl WriteGuard<'_> {
    pub fn get(&self) -> i32 {
        self.lock.read_data()
    }

    pub fn set(&mut self, value: i32) {
        self.lock.write_data(value);
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::thread;
    use std::time::{Duration, Instant};

    fn lock() -> ReaderWriterLock {
        ReaderWriterLock::allocate(&SyncConfig::default()).unwrap()
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_starts_unlocked() {
        let lock = lock();
        assert_eq!(lock.mode(), Some(LockMode::Unlocked));
        assert_eq!(lock.sequence(), 0);
    }

    #[test]
    fn test_readers_share() {
        let lock = lock();
        lock.acquire_read();
        lock.acquire_read();
        assert_eq!(lock.mode(), Some(LockMode::Read(2)));
        assert!(!lock.try_acquire_write());
        lock.release_read();
        lock.release_read();
        assert_eq!(lock.mode(), Some(LockMode::Unlocked));
    }

    #[test]
    fn test_writer_excludes_everyone() {
        let lock = lock();
        lock.acquire_write();
        assert_eq!(lock.mode(), Some(LockMode::Write));
        assert!(!lock.try_acquire_read());
        assert!(!lock.try_acquire_write());
        lock.write_data(9);
        lock.release_write();

        let snap = lock.snapshot();
        assert_eq!(snap.state, 0);
        assert_eq!(snap.data, 9);
        assert_eq!(snap.sequence, 1);
        assert_eq!(snap.waiting_writers, 0);
    }

    #[test]
    fn test_guards_release_on_drop() {
        let lock = lock();
        {
            let mut w = lock.write();
            w.set(3);
            assert_eq!(w.get(), 3);
        }
        {
            let r1 = lock.read();
            let r2 = lock.try_read().expect("second reader admitted");
            assert_eq!(r1.get(), r2.get());
            assert!(lock.try_write().is_none());
        }
        assert_eq!(lock.mode(), Some(LockMode::Unlocked));
        assert_eq!(lock.sequence(), 1);
    }

    #[test]
    fn test_waiting_writer_blocks_new_readers() {
        let lock = lock();
        lock.acquire_read();

        let writer = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.acquire_write();
                lock.write_data(1);
                lock.release_write();
            })
        };

        wait_until(|| lock.waiting_writers() == 1);
        assert!(!lock.try_acquire_read(), "reader admitted past waiting writer");

        lock.release_read();
        writer.join().unwrap();
        assert_eq!(lock.sequence(), 1);
        assert_eq!(lock.waiting_writers(), 0);
        assert!(lock.try_acquire_read());
        lock.release_read();
    }

    #[test]
    fn test_blocked_reader_resumes_after_writer() {
        let lock = lock();
        lock.acquire_write();

        let reader = {
            let lock = lock.clone();
            thread::spawn(move || {
                let guard = lock.read();
                guard.get()
            })
        };

        thread::sleep(Duration::from_millis(5));
        lock.write_data(77);
        lock.release_write();
        assert_eq!(reader.join().unwrap(), 77);
    }

    #[test]
    fn test_lock_mode_decode() {
        assert_eq!(LockMode::from_state(0), Some(LockMode::Unlocked));
        assert_eq!(LockMode::from_state(-1), Some(LockMode::Write));
        assert_eq!(LockMode::from_state(5), Some(LockMode::Read(5)));
        assert_eq!(LockMode::from_state(-2), None);
    }

    #[test]
    fn test_attach_wrong_len() {
        let segment = SharedSegment::allocate(3, &SyncConfig::default()).unwrap();
        assert!(matches!(
            ReaderWriterLock::attach(segment),
            Err(SyncError::InvalidLayout { expected: 4, actual: 3 })
        ));
    }
}
