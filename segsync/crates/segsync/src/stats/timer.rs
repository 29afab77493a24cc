//! Timer - Timing Utilities
//!
//! Monotonic timer for measuring lock waits, barrier waits and whole runs.

use std::time::{Duration, Instant};

/// Timer measuring from its creation
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_elapsed_is_monotonic() {
        let timer = Timer::start();
        thread::sleep(Duration::from_millis(2));
        let first = timer.elapsed();
        assert!(first >= Duration::from_millis(2));
        assert!(timer.elapsed() >= first);
    }
}
