//! Command modules for the segctl CLI.
//!
//! One module per demo, each following the [`traits::Command`] pattern.

pub mod common;
pub mod traits;

pub mod barrier;
pub mod counter;
pub mod rwlock;

pub use barrier::{run_barrier, BarrierArgs};
pub use counter::{run_counter, CounterArgs};
pub use rwlock::{run_rwlock, RwLockArgs};
