//! Test Utilities for the Segsync Test Suite
//!
//! Fixtures that build primitives for every available wait strategy, and
//! strict assertion helpers. A protocol bug usually shows up under one
//! strategy only, so most concurrent tests run once per strategy.

#![allow(dead_code)]

use segsync::{
    AtomicCounter, ReaderWriterLock, ReusableBarrier, SyncConfig, WaitStrategy,
};
use std::thread;
use std::time::{Duration, Instant};

/// Maximum time any test waits for a condition
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// ============================================================================
/// CONFIG FIXTURES
/// ============================================================================

/// Config for `strategy` with short parks, so missed wakeups stay visible as
/// slowness rather than hangs
pub fn config_for(strategy: WaitStrategy) -> SyncConfig {
    SyncConfig {
        wait_strategy: strategy,
        spin_limit: 16,
        park_timeout_us: 500,
    }
}

/// One config per strategy usable on this platform
pub fn all_configs() -> Vec<SyncConfig> {
    WaitStrategy::available().map(config_for).collect()
}

/// Worker count for concurrent tests: at least 4 even on small machines
pub fn worker_count() -> usize {
    num_cpus::get().clamp(4, 8)
}

/// ============================================================================
/// PRIMITIVE FIXTURES
/// ============================================================================

pub fn lock(config: &SyncConfig) -> ReaderWriterLock {
    ReaderWriterLock::allocate(config).expect("lock allocation should succeed")
}

pub fn barrier(participants: usize, config: &SyncConfig) -> ReusableBarrier {
    ReusableBarrier::allocate(participants, config).expect("barrier allocation should succeed")
}

pub fn counter(config: &SyncConfig) -> AtomicCounter {
    AtomicCounter::allocate(config).expect("counter allocation should succeed")
}

/// ============================================================================
/// STRICT ASSERTIONS
/// ============================================================================

/// Assert exact equality with the strategy in the message
#[track_caller]
pub fn assert_exact(actual: i64, expected: i64, what: &str, config: &SyncConfig) {
    assert_eq!(
        actual, expected,
        "{what}: expected exactly {expected}, got {actual} (strategy {})",
        config.wait_strategy
    );
}

/// Assert a counter of violations stayed at zero
#[track_caller]
pub fn assert_none_observed(violations: usize, what: &str, config: &SyncConfig) {
    assert_eq!(
        violations, 0,
        "{what}: {violations} violations observed (strategy {})",
        config.wait_strategy
    );
}

/// Poll `cond` until it holds or `TEST_TIMEOUT` expires
#[track_caller]
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + TEST_TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_micros(200));
    }
}

/// Join every handle, failing the test if any worker panicked
#[track_caller]
pub fn join_all<T>(handles: Vec<thread::JoinHandle<T>>) -> Vec<T> {
    handles
        .into_iter()
        .map(|h| h.join().expect("worker thread panicked"))
        .collect()
}
