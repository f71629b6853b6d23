//! Change Notification Tests
//!
//! One callback per root commit, with the merged value, in commit order.

use crate::common::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

#[test]
fn nested_calls_do_not_notify_individually() {
    let (guard, seen) = recording_guard(Vec::<u8>::new());

    guard.with_value(|outer| {
        outer.update(|v| v.push(1));
        guard.with_value(|inner| {
            inner.update(|v| v.push(2));
            guard.with_value(|innermost| innermost.update(|v| v.push(3)));
            assert!(seen.lock().is_empty());
        });
        outer.update(|v| v.push(4));
    });

    assert_eq!(*seen.lock(), vec![vec![1, 2, 3, 4]]);
}

#[test]
fn each_root_commit_notifies_once() {
    let (guard, seen) = recording_guard(0u32);

    for _ in 0..3 {
        guard.update(|v| *v += 1);
    }
    guard.set_value(10);

    assert_eq!(*seen.lock(), vec![1, 2, 3, 10]);
}

#[test]
fn callback_runs_after_lock_release() {
    let slot: Arc<Mutex<Option<Arc<GuardedValue<u32>>>>> = Arc::new(Mutex::new(None));
    let read_elsewhere = Arc::new(Mutex::new(Vec::new()));

    let guard = {
        let slot = Arc::clone(&slot);
        let read_elsewhere = Arc::clone(&read_elsewhere);
        Arc::new(
            GuardedValue::builder(0u32)
                .on_change(move |_: &u32| {
                    let guard = slot.lock().clone();
                    if let Some(guard) = guard {
                        // Would deadlock if the lock were still held here
                        let value = thread::spawn(move || guard.get()).join().unwrap();
                        read_elsewhere.lock().push(value);
                    }
                })
                .build(),
        )
    };
    *slot.lock() = Some(Arc::clone(&guard));

    guard.with_value(|w| w.set(4));
    guard.set_value(5);

    assert_eq!(*read_elsewhere.lock(), vec![4, 5]);
    slot.lock().take();
}

#[test]
fn callback_sees_own_guard_unlocked() {
    let slot: Arc<Mutex<Option<Arc<GuardedValue<u32>>>>> = Arc::new(Mutex::new(None));
    let depth_in_callback = Arc::new(Mutex::new(Vec::new()));

    let guard = {
        let slot = Arc::clone(&slot);
        let depth_in_callback = Arc::clone(&depth_in_callback);
        Arc::new(
            GuardedValue::builder(0u32)
                .on_change(move |_: &u32| {
                    let guard = slot.lock().clone();
                    if let Some(guard) = guard {
                        depth_in_callback.lock().push(guard.depth());
                    }
                })
                .build(),
        )
    };
    *slot.lock() = Some(Arc::clone(&guard));

    guard.with_value(|w| {
        guard.with_value(|inner| inner.set(1));
        w.update(|v| *v += 1);
    });

    assert_eq!(*depth_in_callback.lock(), vec![0]);
    assert_eq!(guard.get(), 2);
    slot.lock().take();
}

#[test]
fn commit_from_inside_callback_is_delivered_after_it() {
    let slot: Arc<Mutex<Option<Arc<GuardedValue<u32>>>>> = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let guard = {
        let slot = Arc::clone(&slot);
        let seen = Arc::clone(&seen);
        Arc::new(
            GuardedValue::builder(0u32)
                .on_change(move |v: &u32| {
                    seen.lock().push(*v);
                    if *v == 1 {
                        let guard = slot.lock().clone();
                        if let Some(guard) = guard {
                            guard.update(|v| *v = 2);
                            // Queued behind the running callback
                            assert_eq!(seen.lock().len(), 1);
                        }
                    }
                })
                .build(),
        )
    };
    *slot.lock() = Some(Arc::clone(&guard));

    guard.set_value(1);

    assert_eq!(*seen.lock(), vec![1, 2]);
    assert_eq!(guard.get(), 2);
    slot.lock().take();
}

#[test]
fn delivery_order_matches_commit_order_across_threads() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let guard = Arc::new(
        GuardedValue::builder(0u64)
            .on_change(move |v: &u64| sink.lock().push(*v))
            .build(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guard = Arc::clone(&guard);
            thread::spawn(move || {
                for _ in 0..250 {
                    guard.update(|v| *v += 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let seen = seen.lock();
    assert_eq!(seen.len(), 2000);
    let expected: Vec<u64> = (1..=2000).collect();
    assert_eq!(*seen, expected);
}

#[test]
fn delivering_thread_runs_callbacks_for_other_committers() {
    let slot: Arc<Mutex<Option<Arc<GuardedValue<u32>>>>> = Arc::new(Mutex::new(None));
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let guard = {
        let slot = Arc::clone(&slot);
        let delivered = Arc::clone(&delivered);
        Arc::new(
            GuardedValue::builder(0u32)
                .on_change(move |v: &u32| {
                    delivered.lock().push((*v, thread::current().id()));
                    if *v == 1 {
                        let guard = slot.lock().clone();
                        if let Some(guard) = guard {
                            // Returns without waiting for its own callback
                            thread::spawn(move || guard.set_value(2)).join().unwrap();
                            assert_eq!(delivered.lock().len(), 1);
                        }
                    }
                })
                .build(),
        )
    };
    *slot.lock() = Some(Arc::clone(&guard));

    guard.set_value(1);

    let me = thread::current().id();
    assert_eq!(*delivered.lock(), vec![(1, me), (2, me)]);
    slot.lock().take();
}
