//! Reader-Writer Lock Concurrency Tests
//!
//! Mutual exclusion, write sequencing and writer priority under real
//! contention, once per wait strategy.

mod common;

use common::{
    all_configs, assert_exact, assert_none_observed, join_all, lock, wait_until, worker_count,
};
use segsync::LockMode;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Value a writer leaves in SHARED_DATA halfway through its critical section
const INTERMEDIATE: i32 = -1;

/// ============================================================================
/// MUTUAL EXCLUSION
/// ============================================================================

/// Readers and writers hammer the lock while external counters track who is
/// inside.
///
/// **Bug this finds:** writer admitted alongside readers, two writers at
/// once, readers observing a half-finished write
#[test]
fn test_mutual_exclusion() {
    for config in all_configs() {
        let lock = lock(&config);
        let readers_inside = Arc::new(AtomicUsize::new(0));
        let writers_inside = Arc::new(AtomicUsize::new(0));
        let violations = Arc::new(AtomicUsize::new(0));
        let torn_reads = Arc::new(AtomicUsize::new(0));

        let workers = worker_count();
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let lock = lock.clone();
                let readers_inside = Arc::clone(&readers_inside);
                let writers_inside = Arc::clone(&writers_inside);
                let violations = Arc::clone(&violations);
                let torn_reads = Arc::clone(&torn_reads);
                let is_writer = i % 3 == 0;

                thread::spawn(move || {
                    for op in 0..300 {
                        if is_writer {
                            lock.acquire_write();
                            if writers_inside.fetch_add(1, Ordering::SeqCst) != 0
                                || readers_inside.load(Ordering::SeqCst) != 0
                            {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            lock.write_data(INTERMEDIATE);
                            thread::yield_now();
                            lock.write_data(op);
                            writers_inside.fetch_sub(1, Ordering::SeqCst);
                            lock.release_write();
                        } else {
                            lock.acquire_read();
                            readers_inside.fetch_add(1, Ordering::SeqCst);
                            if writers_inside.load(Ordering::SeqCst) != 0 {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            if lock.read_data() == INTERMEDIATE {
                                torn_reads.fetch_add(1, Ordering::SeqCst);
                            }
                            readers_inside.fetch_sub(1, Ordering::SeqCst);
                            lock.release_read();
                        }
                    }
                })
            })
            .collect();

        join_all(handles);

        assert_none_observed(violations.load(Ordering::SeqCst), "exclusion", &config);
        assert_none_observed(torn_reads.load(Ordering::SeqCst), "torn reads", &config);
        assert_eq!(lock.mode(), Some(LockMode::Unlocked));
        assert_eq!(lock.waiting_writers(), 0);
    }
}

/// ============================================================================
/// WRITE SEQUENCING
/// ============================================================================

/// 4 readers x 100 reads, 2 writers x 50 writes.
///
/// **Bug this finds:** SEQUENCE bumped twice or not at all, final value not
/// the last write, reads lost
#[test]
fn test_four_readers_two_writers_scenario() {
    const READERS: usize = 4;
    const READS: usize = 100;
    const WRITERS: usize = 2;
    const WRITES: i32 = 50;

    for config in all_configs() {
        let lock = lock(&config);
        let reads_done = Arc::new(AtomicUsize::new(0));
        let torn_reads = Arc::new(AtomicUsize::new(0));
        let last_written = Arc::new(AtomicI32::new(0));

        let mut handles = Vec::new();
        for _ in 0..READERS {
            let lock = lock.clone();
            let reads_done = Arc::clone(&reads_done);
            let torn_reads = Arc::clone(&torn_reads);
            handles.push(thread::spawn(move || {
                for _ in 0..READS {
                    let guard = lock.read();
                    if guard.get() == INTERMEDIATE {
                        torn_reads.fetch_add(1, Ordering::SeqCst);
                    }
                    drop(guard);
                    reads_done.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for w in 0..WRITERS as i32 {
            let lock = lock.clone();
            let last_written = Arc::clone(&last_written);
            handles.push(thread::spawn(move || {
                for i in 1..=WRITES {
                    let value = (w + 1) * 1000 + i;
                    let mut guard = lock.write();
                    guard.set(INTERMEDIATE);
                    thread::yield_now();
                    guard.set(value);
                    last_written.store(value, Ordering::SeqCst);
                }
            }));
        }

        join_all(handles);

        let snap = lock.snapshot();
        assert_exact(reads_done.load(Ordering::SeqCst) as i64, 400, "reads", &config);
        assert_exact(snap.sequence as i64, 100, "sequence", &config);
        assert_exact(
            snap.data as i64,
            last_written.load(Ordering::SeqCst) as i64,
            "final value",
            &config,
        );
        assert_none_observed(torn_reads.load(Ordering::SeqCst), "torn reads", &config);
    }
}

/// ============================================================================
/// WRITER PRIORITY
/// ============================================================================

/// Readers cycle the lock continuously; one writer arrives and must get in.
///
/// **Bug this finds:** reader stream starving a writer, readers admitted
/// freely while a writer is announced
#[test]
fn test_writer_not_starved_by_reader_stream() {
    const READERS: usize = 4;

    for config in all_configs() {
        let lock = lock(&config);
        let stop = Arc::new(AtomicBool::new(false));
        let admitted_while_announced = Arc::new(AtomicUsize::new(0));
        let reader_cycles = Arc::new(AtomicUsize::new(0));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let lock = lock.clone();
                let stop = Arc::clone(&stop);
                let admitted = Arc::clone(&admitted_while_announced);
                let cycles = Arc::clone(&reader_cycles);
                thread::spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        lock.acquire_read();
                        if lock.waiting_writers() > 0 {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_micros(50));
                        lock.release_read();
                        cycles.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        wait_until("readers to get going", || {
            reader_cycles.load(Ordering::SeqCst) >= READERS * 10
        });

        let writer = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.acquire_write();
                lock.write_data(1);
                lock.release_write();
            })
        };
        join_all(vec![writer]);

        stop.store(true, Ordering::SeqCst);
        join_all(readers);

        assert_eq!(lock.sequence(), 1);
        let admitted = admitted_while_announced.load(Ordering::SeqCst);
        assert!(
            admitted <= READERS,
            "{admitted} reader admissions overlapped a waiting writer, bound is {READERS} \
             (strategy {})",
            config.wait_strategy
        );
    }
}

/// Several writers queue behind one reader and all of them finish.
///
/// **Bug this finds:** WAITING_WRITERS not decremented, writers deadlocking
/// on each other's announcement
#[test]
fn test_queued_writers_all_complete() {
    for config in all_configs() {
        let lock = lock(&config);
        lock.acquire_read();

        let writers: Vec<_> = (0..3)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        lock.write().set(7);
                    }
                })
            })
            .collect();

        wait_until("writers to announce", || lock.waiting_writers() == 3);
        assert!(!lock.try_acquire_read());
        lock.release_read();

        join_all(writers);
        assert_eq!(lock.sequence(), 60);
        assert_eq!(lock.waiting_writers(), 0);
        assert_eq!(lock.mode(), Some(LockMode::Unlocked));
    }
}
