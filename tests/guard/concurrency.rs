//! Cross-Thread Tests
//!
//! Mutual exclusion, visibility of commits and independence of guards.

use crate::common::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_increments_lose_nothing() {
    const THREADS: usize = 50;
    const INCREMENTS: usize = 200;

    let guard = Arc::new(GuardedValue::new(0usize));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..INCREMENTS {
                    guard.with_value(|working| working.update(|v| *v += 1));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(guard.get(), THREADS * INCREMENTS);
    assert_eq!(guard.stats().commits, (THREADS * INCREMENTS) as u64);
}

#[test]
fn concurrent_nested_increments_lose_nothing() {
    let guard = Arc::new(GuardedValue::new(0u64));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guard = Arc::clone(&guard);
            thread::spawn(move || {
                for _ in 0..100 {
                    guard.with_value(|outer| {
                        outer.update(|v| *v += 1);
                        guard.with_value(|inner| inner.update(|v| *v += 1));
                        outer.update(|v| *v += 1);
                    });
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(guard.get(), 8 * 100 * 3);
}

#[test]
fn other_thread_blocks_until_outermost_commit() {
    let guard = Arc::new(GuardedValue::new(Vec::<&'static str>::new()));
    let entered = Arc::new(Barrier::new(2));
    let finished_outer = Arc::new(AtomicBool::new(false));

    let holder = {
        let guard = Arc::clone(&guard);
        let entered = Arc::clone(&entered);
        let finished_outer = Arc::clone(&finished_outer);
        thread::spawn(move || {
            guard.with_value(|outer| {
                outer.update(|v| v.push("holder-start"));
                entered.wait();
                thread::sleep(Duration::from_millis(50));
                guard.with_value(|inner| inner.update(|v| v.push("holder-nested")));
                outer.update(|v| v.push("holder-end"));
                finished_outer.store(true, Ordering::SeqCst);
            });
        })
    };

    entered.wait();
    // Blocks until the holder's outermost call has committed
    guard.with_value(|working| {
        assert!(finished_outer.load(Ordering::SeqCst));
        working.update(|v| v.push("waiter"));
    });
    holder.join().unwrap();

    assert_eq!(
        guard.get(),
        vec!["holder-start", "holder-nested", "holder-end", "waiter"]
    );
}

#[test]
fn reader_never_sees_uncommitted_value() {
    let guard = Arc::new(GuardedValue::new((0u64, 0u64)));

    let writer = {
        let guard = Arc::clone(&guard);
        thread::spawn(move || {
            for i in 1..=500u64 {
                guard.with_value(|working| {
                    working.update(|pair| pair.0 = i);
                    guard.with_value(|inner| inner.update(|pair| pair.1 = i));
                });
            }
        })
    };

    for _ in 0..500 {
        let (a, b) = guard.get();
        assert_eq!(a, b, "observed a half-applied transaction");
    }
    writer.join().unwrap();
    assert_eq!(guard.get(), (500, 500));
}

#[test]
fn independent_guards_never_interfere() {
    let a = Arc::new(GuardedValue::new(0u32));
    let b = Arc::new(GuardedValue::new(0u32));

    a.with_value(|working| {
        working.set(1);
        // A different guard is free while `a` is held, from any thread
        let b2 = Arc::clone(&b);
        thread::spawn(move || b2.set_value(2)).join().unwrap();
        assert_eq!(b.depth(), 0);
        assert_eq!(b.get(), 2);
    });

    assert_eq!(a.get(), 1);
    assert_eq!(b.get(), 2);
    assert_eq!(a.stats().commits, 1);
    assert_eq!(b.stats().commits, 1);
}
