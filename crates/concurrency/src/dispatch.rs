//! Ordered delivery of change notifications
//!
//! Root commits push `(commit_seq, value)` while the guard's lock is still
//! held, so queue order is commit order. After the lock is released, the
//! committing thread tries to become the dispatcher and drains the queue,
//! invoking the callback outside every lock:
//!
//! ```text
//! T1: lock → commit #1 → enqueue #1 → unlock → claim dispatcher → deliver #1 ...
//! T2:            lock → commit #2 → enqueue #2 → unlock → dispatcher busy → return
//! T1:                                   ... deliver #2 → queue empty → release
//! ```
//!
//! A commit made from inside the callback on the dispatching thread lands in
//! the queue and is delivered once the running callback returns.
//!
//! The dispatcher drains until the queue is empty, including entries other
//! threads enqueue meanwhile; their committers have already returned. Under
//! sustained contention the dispatching thread's own call therefore does not
//! return until the other committers pause.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Callback fired with the committed value after each root commit
pub type ChangeCallback<V> = Arc<dyn Fn(&V) + Send + Sync>;

struct Pending<V> {
    queue: VecDeque<(u64, V)>,
    dispatching: bool,
}

/// Queue of committed values awaiting delivery
pub(crate) struct Dispatcher<V> {
    callback: Option<ChangeCallback<V>>,
    pending: Mutex<Pending<V>>,
}

impl<V> Dispatcher<V> {
    pub(crate) fn new(callback: Option<ChangeCallback<V>>) -> Self {
        Self {
            callback,
            pending: Mutex::new(Pending {
                queue: VecDeque::new(),
                dispatching: false,
            }),
        }
    }

    /// Whether a callback is installed (and committed values need cloning)
    pub(crate) fn is_active(&self) -> bool {
        self.callback.is_some()
    }

    /// Queue a committed value. Must be called while the guard lock is held.
    pub(crate) fn enqueue(&self, commit_seq: u64, value: V) {
        if self.callback.is_some() {
            self.pending.lock().queue.push_back((commit_seq, value));
        }
    }

    /// Number of values waiting for delivery
    pub(crate) fn backlog(&self) -> usize {
        self.pending.lock().queue.len()
    }

    /// Deliver queued values in commit order, unless another call is already
    /// doing so. Must be called with the guard lock released.
    pub(crate) fn drain(&self, label: &str) {
        let Some(callback) = &self.callback else {
            return;
        };

        {
            let mut pending = self.pending.lock();
            if pending.dispatching {
                return;
            }
            pending.dispatching = true;
        }

        let mut claim = Claim {
            pending: &self.pending,
            released: false,
        };

        loop {
            let next = {
                let mut pending = self.pending.lock();
                match pending.queue.pop_front() {
                    Some(entry) => entry,
                    None => {
                        // Emptiness check and release happen under one lock so a
                        // concurrent enqueue cannot be stranded.
                        pending.dispatching = false;
                        claim.released = true;
                        break;
                    }
                }
            };
            let (commit_seq, value) = next;
            trace!(guard = %label, commit_seq, "delivering change notification");
            callback(&value);
        }
    }
}

/// Releases the dispatcher role if a callback unwinds mid-drain
struct Claim<'a, V> {
    pending: &'a Mutex<Pending<V>>,
    released: bool,
}

impl<V> Drop for Claim<'_, V> {
    fn drop(&mut self) {
        if !self.released {
            self.pending.lock().dispatching = false;
        }
    }
}
