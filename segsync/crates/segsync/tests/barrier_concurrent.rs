//! Barrier Concurrency Tests
//!
//! Phase safety and reuse with random per-phase work, once per wait
//! strategy.

mod common;

use common::{all_configs, assert_exact, assert_none_observed, barrier, join_all, worker_count};
use rand::Rng;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// ============================================================================
/// PHASE SAFETY
/// ============================================================================

/// Every participant stamps the phase it is working in; after the barrier
/// all stamps must agree, and no one may be released while someone is
/// still working in the previous phase.
///
/// **Bug this finds:** early release, late arrival counted into the next
/// phase, COUNT not reset before the sense flip
#[test]
fn test_phase_safety_with_random_work() {
    const PHASES: usize = 60;

    for config in all_configs() {
        let workers = worker_count();
        let barrier = barrier(workers, &config);
        let arrived_in_phase: Arc<Vec<AtomicI32>> =
            Arc::new((0..workers).map(|_| AtomicI32::new(-1)).collect());
        let violations = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let participant = barrier.participant(i).unwrap();
                let arrived_in_phase = Arc::clone(&arrived_in_phase);
                let violations = Arc::clone(&violations);
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for phase in 0..PHASES as i32 {
                        thread::sleep(Duration::from_micros(rng.gen_range(0..200)));
                        arrived_in_phase[i].store(phase, Ordering::SeqCst);

                        let result = participant.arrive_and_wait();
                        if result.phase as i32 != phase {
                            violations.fetch_add(1, Ordering::SeqCst);
                        }
                        // Everyone must have arrived for this phase already
                        for stamp in arrived_in_phase.iter() {
                            if stamp.load(Ordering::SeqCst) < phase {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                })
            })
            .collect();
        join_all(handles);

        assert_none_observed(violations.load(Ordering::SeqCst), "phase safety", &config);
        assert_exact(barrier.phase() as i64, PHASES as i64, "phase", &config);
        assert_eq!(barrier.arrived(), 0);
        assert_eq!(barrier.participant_phases(), vec![PHASES as u32; workers]);
    }
}

/// ============================================================================
/// REUSE
/// ============================================================================

/// Count how many participants pass each phase; with reuse over many phases
/// the count must be exactly W every time, never W-1 or W+1.
///
/// **Bug this finds:** sense not flipped, stale COUNT carried over, fast
/// participant lapping slow ones
#[test]
fn test_reuse_releases_exactly_all() {
    const PHASES: usize = 50;

    for config in all_configs() {
        let workers = worker_count();
        let barrier = barrier(workers, &config);
        let passed: Arc<Vec<AtomicUsize>> =
            Arc::new((0..=PHASES).map(|_| AtomicUsize::new(0)).collect());
        let leaders = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let participant = barrier.participant(i).unwrap();
                let passed = Arc::clone(&passed);
                let leaders = Arc::clone(&leaders);
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for phase in 0..PHASES {
                        if rng.gen_bool(0.3) {
                            thread::yield_now();
                        }
                        let result = participant.arrive_and_wait();
                        if result.is_leader {
                            leaders.fetch_add(1, Ordering::SeqCst);
                        }
                        passed[phase].fetch_add(1, Ordering::SeqCst);

                        // Nobody may be past the next barrier yet
                        let ahead = passed[phase + 1].load(Ordering::SeqCst);
                        assert_eq!(ahead, 0, "participant {i} saw phase {} released early", phase + 1);
                    }
                })
            })
            .collect();
        join_all(handles);

        for (phase, count) in passed.iter().take(PHASES).enumerate() {
            assert_eq!(
                count.load(Ordering::SeqCst),
                workers,
                "phase {phase} released the wrong number of participants (strategy {})",
                config.wait_strategy
            );
        }
        assert_exact(leaders.load(Ordering::SeqCst) as i64, PHASES as i64, "leaders", &config);
    }
}
