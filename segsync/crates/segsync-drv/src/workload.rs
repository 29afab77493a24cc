//! Workload - Simulated Work and Delays
//!
//! The primitives do not care what a worker does between or inside
//! acquisitions. The demos stand in for real work with a sleep drawn
//! uniformly from `[base, base + variance]`.

use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Uniform duration range `[base, base + variance]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkRange {
    pub base: Duration,
    pub variance: Duration,
}

impl WorkRange {
    /// No work at all
    pub const NONE: WorkRange = WorkRange {
        base: Duration::ZERO,
        variance: Duration::ZERO,
    };

    pub fn new(base: Duration, variance: Duration) -> Self {
        Self { base, variance }
    }

    pub fn from_millis(base: u64, variance: u64) -> Self {
        Self::new(Duration::from_millis(base), Duration::from_millis(variance))
    }

    pub fn from_micros(base: u64, variance: u64) -> Self {
        Self::new(Duration::from_micros(base), Duration::from_micros(variance))
    }

    /// Constant duration
    pub fn fixed(duration: Duration) -> Self {
        Self::new(duration, Duration::ZERO)
    }

    pub fn max(&self) -> Duration {
        self.base.saturating_add(self.variance)
    }

    pub fn is_zero(&self) -> bool {
        self.max().is_zero()
    }

    /// Draw one duration from the range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.variance.is_zero() {
            return self.base;
        }
        let extra = rng.gen_range(0..=self.variance.as_nanos() as u64);
        self.base.saturating_add(Duration::from_nanos(extra))
    }
}

/// Spend `duration` off-CPU; returns immediately for zero
pub fn simulate(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
