//! # Segsync - Synchronization Primitives over a Shared Segment
//!
//! Segsync implements three classic synchronization primitives whose entire
//! state lives in a fixed block of 32-bit atomic slots shared by every
//! participating thread:
//!
//! - **AtomicCounter**: exact increments with `fetch_add`, next to a
//!   deliberately non-atomic counter that loses updates
//! - **ReaderWriterLock**: many readers or one writer, writer priority
//! - **ReusableBarrier**: sense-reversing rendezvous, reusable across phases
//!
//! ## Quick Start
//!
//! ```rust
//! use std::thread;
//! use segsync::{ReaderWriterLock, SyncConfig};
//!
//! fn main() -> Result<(), segsync::SyncError> {
//!     let lock = ReaderWriterLock::allocate(&SyncConfig::default())?;
//!
//!     let writer = {
//!         let lock = lock.clone();
//!         thread::spawn(move || {
//!             for i in 1..=10 {
//!                 lock.write().set(i);
//!             }
//!         })
//!     };
//!
//!     let value = lock.read().get();
//!     assert!((0..=10).contains(&value));
//!
//!     writer.join().unwrap();
//!     assert_eq!(lock.sequence(), 10);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Worker Threads                        │
//! │   ┌──────────┐      ┌──────────┐      ┌──────────┐        │
//! │   │ reader 0 │      │ writer 0 │      │ reader 1 │  ...   │
//! │   └────┬─────┘      └────┬─────┘      └────┬─────┘        │
//! │        └─────────────────┼─────────────────┘              │
//! │                          │ acquire / release / arrive     │
//! └──────────────────────────┼────────────────────────────────┘
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │   Primitive  (AtomicCounter | ReaderWriterLock | Barrier) │
//! │      named slot indices, protocol state machine           │
//! └──────────────────────────┬────────────────────────────────┘
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │   SharedSegment  [i32; n]  SeqCst atomics + Waiter        │
//! │      wait_while(slot, v) / wake_all(slot)                 │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each primitive is a thin, cloneable handle over an `Arc<SharedSegment>`.
//! The segment is allocated once, before any worker starts, and is never
//! resized.
//!
//! ## Blocking
//!
//! `acquire_read`, `acquire_write` and `arrive_and_wait` are the only blocking
//! operations. How they block is chosen by [`WaitStrategy`]; the guarantees
//! are the same for all of them.
//!
//! ## Limitations
//!
//! - No timeouts and no cancellation inside the primitives
//! - A lock holder that never releases, or a barrier participant that never
//!   arrives, stalls the others permanently
//!
//! ## Modules
//!
//! - [`segment`]: the shared slot block and its atomic operations
//! - [`wait`]: wait strategies
//! - [`counter`]: atomic and non-atomic counters
//! - [`rwlock`]: writer-priority reader-writer lock
//! - [`barrier`]: sense-reversing reusable barrier
//! - [`stats`]: timing histograms
//! - [`config`]: wait tuning
//! - [`error`]: error types

pub mod config;
pub mod error;

// Foundation
pub mod segment;
pub mod wait;

// Primitives
pub mod barrier;
pub mod counter;
pub mod rwlock;

pub mod stats;

pub use barrier::{BarrierParticipant, BarrierState, BarrierWaitResult, ReusableBarrier};
pub use config::{ConfigError, SyncConfig};
pub use counter::{AtomicCounter, CounterMode, CounterSlot, RaceWindow};
pub use error::{Result, SyncError};
pub use rwlock::{LockMode, ReadGuard, ReaderWriterLock, RwLockSnapshot, WriteGuard};
pub use segment::{AtomicCell, SegmentRef, SharedSegment};
pub use wait::WaitStrategy;

/// Segsync version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
