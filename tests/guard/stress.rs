//! Stress Tests
//!
//! Heavy-workload tests. All marked #[ignore] for opt-in execution.
//! Run with: cargo test --test guard stress -- --ignored

use crate::common::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Mixed nested writers and readers on one guard
#[test]
#[ignore]
fn stress_nested_writers_and_readers() {
    let guard = Arc::new(GuardedValue::new((0u64, 0u64)));
    let barrier = Arc::new(Barrier::new(16));
    let reads = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..16)
        .map(|thread_id| {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            let reads = Arc::clone(&reads);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..2_000 {
                    if thread_id % 4 == 0 {
                        let (a, b) = guard.get();
                        assert_eq!(a, b);
                        reads.fetch_add(1, Ordering::Relaxed);
                    } else {
                        guard.with_value(|outer| {
                            outer.update(|p| p.0 += 1);
                            guard.with_value(|inner| inner.update(|p| p.1 += 1));
                        });
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let writers = 12u64;
    assert_eq!(guard.get(), (writers * 2_000, writers * 2_000));
    assert_eq!(reads.load(Ordering::Relaxed), 4 * 2_000);
}

/// Root commit throughput with a callback installed
#[test]
#[ignore]
fn stress_commit_throughput_with_callback() {
    let delivered = Arc::new(AtomicU64::new(0));
    let sink = Arc::clone(&delivered);
    let guard = GuardedValue::builder(0u64)
        .on_change(move |_: &u64| {
            sink.fetch_add(1, Ordering::Relaxed);
        })
        .build();

    let duration = Duration::from_secs(2);
    let start = Instant::now();
    let mut commits = 0u64;
    while start.elapsed() < duration {
        guard.update(|v| *v += 1);
        commits += 1;
    }

    println!(
        "Commits: {}, ops/sec: {:.0}",
        commits,
        commits as f64 / duration.as_secs_f64()
    );
    assert_eq!(guard.get(), commits);
    assert_eq!(delivered.load(Ordering::Relaxed), commits);
}
