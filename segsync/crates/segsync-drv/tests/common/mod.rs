//! Test Utilities for the Driver Test Suite
//!
//! Controllers for every available wait strategy, fast scenario parameters,
//! and report assertions that print the whole report on failure.

#![allow(dead_code)]

use std::time::Duration;

use segsync::{SyncConfig, WaitStrategy};
use segsync_drv::{
    BarrierReport, Controller, CounterReport, RwLockParams, RwLockReport, WorkRange,
};

/// ============================================================================
/// CONTROLLER FIXTURES
/// ============================================================================

pub fn config_for(strategy: WaitStrategy) -> SyncConfig {
    SyncConfig {
        wait_strategy: strategy,
        spin_limit: 16,
        park_timeout_us: 500,
    }
}

pub fn controller(strategy: WaitStrategy) -> Controller {
    Controller::new(config_for(strategy)).expect("controller should build")
}

/// One controller per strategy usable on this platform
pub fn all_controllers() -> Vec<Controller> {
    WaitStrategy::available().map(controller).collect()
}

/// ============================================================================
/// SCENARIO FIXTURES
/// ============================================================================

/// The reference lock scenario with holds short enough for CI
pub fn quick_rwlock() -> RwLockParams {
    RwLockParams {
        read_hold: WorkRange::from_micros(20, 30),
        write_hold: WorkRange::from_micros(50, 50),
        ..Default::default()
    }
}

/// Work range that keeps a phase around a millisecond
pub fn quick_work() -> WorkRange {
    WorkRange::new(Duration::from_micros(200), Duration::from_micros(800))
}

/// ============================================================================
/// REPORT ASSERTIONS
/// ============================================================================

#[track_caller]
pub fn assert_rwlock_consistent(report: &RwLockReport) {
    assert!(report.is_consistent(), "inconsistent lock run:\n{report}");
}

#[track_caller]
pub fn assert_barrier_consistent(report: &BarrierReport) {
    assert!(report.is_consistent(), "inconsistent barrier run:\n{report}");
}

#[track_caller]
pub fn assert_counter_consistent(report: &CounterReport) {
    assert!(report.is_consistent(), "inconsistent counter run:\n{report}");
}
