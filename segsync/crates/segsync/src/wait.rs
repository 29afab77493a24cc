//! Wait Strategies - How Blocked Threads Wait for a Slot
//!
//! The lock and barrier protocols only ever block in one shape: "wait until
//! slot `i` no longer holds value `v`". This module supplies that operation
//! and its counterpart, "wake everyone waiting on slot `i`".
//!
//! ## Strategies
//!
//! ```text
//! Spin          poll the slot, backing off into yield_now()
//! SpinThenPark  poll up to spin_limit times, then park on a condvar
//! Futex         poll up to spin_limit times, then FUTEX_WAIT on the slot (Linux)
//! ```
//!
//! ## No Lost Wakeups
//!
//! A parking waiter registers in `parked` and then re-reads the slot; a waker
//! stores the slot and then reads `parked`. Both sides are `SeqCst`, so either
//! the waker sees the registration and notifies, or the waiter sees the new
//! value and never sleeps. The futex syscall re-checks the value in the
//! kernel, and the condvar path re-checks it under the parking mutex.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SyncConfig};
use crate::segment::AtomicCell;

/// How a thread blocks until a shared slot changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategy {
    /// Busy-wait with exponential backoff that degrades to yielding
    Spin,
    /// Spin briefly, then park on a condition variable
    SpinThenPark,
    /// Spin briefly, then sleep in the kernel on the slot's address
    Futex,
}

impl WaitStrategy {
    /// All strategies, in declaration order
    pub const ALL: [WaitStrategy; 3] = [Self::Spin, Self::SpinThenPark, Self::Futex];

    /// Kebab-case name as used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            Self::Spin => "spin",
            Self::SpinThenPark => "spin-then-park",
            Self::Futex => "futex",
        }
    }

    /// Whether this strategy can run on the current platform
    pub fn is_available(&self) -> bool {
        match self {
            Self::Spin | Self::SpinThenPark => true,
            Self::Futex => cfg!(target_os = "linux"),
        }
    }

    /// Strategies usable on the current platform
    pub fn available() -> impl Iterator<Item = WaitStrategy> {
        Self::ALL.into_iter().filter(WaitStrategy::is_available)
    }
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaitStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spin" => Ok(Self::Spin),
            "spin-then-park" | "park" => Ok(Self::SpinThenPark),
            "futex" => Ok(Self::Futex),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Per-segment parking state
pub(crate) struct Waiter {
    strategy: WaitStrategy,
    spin_limit: u32,
    park_timeout: Duration,
    /// Threads currently inside `park` or a futex wait
    parked: AtomicUsize,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Waiter {
    pub(crate) fn new(config: &SyncConfig) -> Self {
        Self {
            strategy: config.wait_strategy,
            spin_limit: config.spin_limit,
            park_timeout: Duration::from_micros(config.park_timeout_us),
            parked: AtomicUsize::new(0),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    /// Block while `cell` holds `observed`; spurious returns allowed
    pub(crate) fn wait(&self, cell: &AtomicCell, observed: i32) {
        match self.strategy {
            WaitStrategy::Spin => {
                let backoff = Backoff::new();
                while cell.load() == observed {
                    backoff.snooze();
                }
            }
            WaitStrategy::SpinThenPark | WaitStrategy::Futex => {
                if self.spin(cell, observed) {
                    return;
                }
                self.parked.fetch_add(1, Ordering::SeqCst);
                self.sleep(cell, observed);
                self.parked.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Wake every thread blocked on `cell`
    pub(crate) fn wake_all(&self, cell: &AtomicCell) {
        if self.strategy == WaitStrategy::Spin {
            return;
        }
        if self.parked.load(Ordering::SeqCst) == 0 {
            return;
        }

        if self.strategy == WaitStrategy::Futex && futex::wake_all(cell) {
            return;
        }

        let _guard = self.lock.lock();
        self.cond.notify_all();
    }

    /// Returns true once the slot changed within the spin budget
    fn spin(&self, cell: &AtomicCell, observed: i32) -> bool {
        let backoff = Backoff::new();
        for _ in 0..self.spin_limit {
            if cell.load() != observed {
                return true;
            }
            backoff.spin();
        }
        cell.load() != observed
    }

    fn sleep(&self, cell: &AtomicCell, observed: i32) {
        if self.strategy == WaitStrategy::Futex && futex::wait(cell, observed, self.park_timeout) {
            return;
        }

        let mut guard = self.lock.lock();
        if cell.load() == observed {
            self.cond.wait_for(&mut guard, self.park_timeout);
        }
    }
}

/// Raw futex calls. Each returns false where futexes do not exist, and the
/// caller falls back to the condvar.
#[cfg(target_os = "linux")]
mod futex {
    use std::ptr;
    use std::time::Duration;

    use crate::segment::AtomicCell;

    /// FUTEX_WAIT on the slot; returns on wake, value mismatch, timeout or signal
    pub(super) fn wait(cell: &AtomicCell, observed: i32, timeout: Duration) -> bool {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };
        // SAFETY: the pointer is a live, aligned i32 owned by the segment for
        // the whole call; the kernel only reads it.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                cell.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                observed,
                &ts as *const libc::timespec,
                ptr::null::<i32>(),
                0,
            );
        }
        true
    }

    pub(super) fn wake_all(cell: &AtomicCell) -> bool {
        // SAFETY: as above; FUTEX_WAKE never dereferences the value.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                cell.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                i32::MAX,
                ptr::null::<libc::timespec>(),
                ptr::null::<i32>(),
                0,
            );
        }
        true
    }
}

#[cfg(not(target_os = "linux"))]
mod futex {
    use std::time::Duration;

    use crate::segment::AtomicCell;

    pub(super) fn wait(_cell: &AtomicCell, _observed: i32, _timeout: Duration) -> bool {
        false
    }

    pub(super) fn wake_all(_cell: &AtomicCell) -> bool {
        false
    }
}
