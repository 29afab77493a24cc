//! Stats Module - Wait and Work Time Aggregation
//!
//! Collects timing distributions for demo runs:
//! - How long threads waited to acquire a lock or pass a barrier
//! - How long they spent on simulated work
//!
//! Nothing in here is touched from inside a critical section; workers time
//! around the primitive calls and record afterwards.

pub mod histogram;
pub mod timer;

pub use histogram::{Histogram, Summary};
pub use timer::Timer;
