//! Reentrant guarded value
//!
//! `GuardedValue` wraps one value behind a reentrant lock. A scoped mutation
//! (`with_value`) may call back into the same guard, directly or through any
//! depth of helper code, without deadlocking and without losing writes:
//!
//! ```text
//! with_value            depth 0 → 1   snapshot stored into the working slot
//!   push(1)                           working = [1]
//!   with_value          depth 1 → 2   no snapshot, same working slot
//!     push(2)                         working = [1, 2]
//!                       depth 2 → 1   nothing committed
//!   push(3)                           working = [1, 2, 3]
//!                       depth 1 → 0   stored = [1, 2, 3], callback fired
//! ```
//!
//! Every nesting level sees the single working slot, so an outer frame can
//! never overwrite an inner write with a stale local copy. Operations receive
//! a [`Working`] handle rather than `&mut V`: the handle never keeps a borrow
//! alive across a nested call, which is what lets the nested call write to
//! the same slot.
//!
//! There is no rollback. A failing operation (an `Err` it returns, or a
//! panic) still commits whatever it wrote when it was the outermost frame.

use crate::dispatch::{ChangeCallback, Dispatcher};
use crate::stats::{Counters, GuardStats};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::sync::Arc;
use strata_core::GuardConfig;
use tracing::{debug, trace, warn};

type Initializer<V> = Box<dyn FnOnce() -> V + Send>;

const REENTERED_FROM_CLOSURE: &str =
    "guarded value re-entered from inside a read or update closure; \
     nest scoped mutations at operation level instead";

/// Committed value, possibly not yet produced
enum Committed<V> {
    Deferred(Initializer<V>),
    Initializing,
    Ready(V),
}

impl<V> Committed<V> {
    fn force(&mut self) -> &mut V {
        if let Committed::Deferred(_) = self {
            if let Committed::Deferred(init) = std::mem::replace(self, Committed::Initializing) {
                *self = Committed::Ready(init());
            }
        }
        match self {
            Committed::Ready(value) => value,
            _ => panic!("deferred initializer of a guarded value panicked"),
        }
    }

    fn is_ready(&self) -> bool {
        matches!(self, Committed::Ready(_))
    }
}

/// State protected by the lock
struct Slot<V> {
    committed: Committed<V>,
    /// Present iff `depth > 0`
    working: Option<V>,
    depth: usize,
}

impl<V> Slot<V> {
    fn working(&self) -> &V {
        self.working
            .as_ref()
            .expect("working value must exist while a transaction is open")
    }

    fn working_mut(&mut self) -> &mut V {
        self.working
            .as_mut()
            .expect("working value must exist while a transaction is open")
    }
}

/// A single value behind a reentrant lock with nested scoped mutation
///
/// # Thread Safety
///
/// One thread at a time holds the lock; that thread may re-enter any number
/// of times. Other threads block until the outermost scoped mutation of the
/// holder has committed. Commits are totally ordered by lock acquisition.
///
/// # Change notification
///
/// The optional callback fires once per root commit (and per direct
/// overwrite outside a transaction) with the committed value, after the lock
/// is released, in commit order. Nested returns never fire it.
///
/// A root commit made while its operation panics updates the stored value
/// but skips the callback unless `GuardConfig::notify_on_unwind` is set, so
/// state mirrored through the callback can fall behind after a panic.
///
/// Only one thread delivers callbacks at a time. A committer that finds
/// another thread delivering returns without waiting, and the delivering
/// thread also runs the callbacks for those commits. Under sustained
/// contention the delivering thread's own `with_value` or `set_value` call
/// can therefore take arbitrarily long to return.
pub struct GuardedValue<V> {
    slot: ReentrantMutex<RefCell<Slot<V>>>,
    dispatcher: Dispatcher<V>,
    config: GuardConfig,
    counters: Counters,
}

impl<V: Clone> GuardedValue<V> {
    /// Create a guard holding `initial`
    pub fn new(initial: V) -> Self {
        Self::from_parts(Committed::Ready(initial), None, GuardConfig::default())
    }

    /// Create a guard whose initial value is produced on first access
    ///
    /// The initializer runs at most once, under the lock.
    pub fn with_initializer<F>(init: F) -> Self
    where
        F: FnOnce() -> V + Send + 'static,
    {
        Self::from_parts(
            Committed::Deferred(Box::new(init)),
            None,
            GuardConfig::default(),
        )
    }

    /// Create a guard holding `initial` with a custom config
    pub fn with_config(initial: V, config: GuardConfig) -> Self {
        Self::from_parts(Committed::Ready(initial), None, config)
    }

    /// Start a builder for a guard holding `initial`
    pub fn builder(initial: V) -> GuardedValueBuilder<V> {
        GuardedValueBuilder {
            committed: Committed::Ready(initial),
            on_change: None,
            config: GuardConfig::default(),
        }
    }

    /// Start a builder for a guard with a deferred initial value
    pub fn deferred_builder<F>(init: F) -> GuardedValueBuilder<V>
    where
        F: FnOnce() -> V + Send + 'static,
    {
        GuardedValueBuilder {
            committed: Committed::Deferred(Box::new(init)),
            on_change: None,
            config: GuardConfig::default(),
        }
    }

    fn from_parts(
        committed: Committed<V>,
        on_change: Option<ChangeCallback<V>>,
        config: GuardConfig,
    ) -> Self {
        Self {
            slot: ReentrantMutex::new(RefCell::new(Slot {
                committed,
                working: None,
                depth: 0,
            })),
            dispatcher: Dispatcher::new(on_change),
            config,
            counters: Counters::default(),
        }
    }

    /// Read through a projection
    ///
    /// Sees the working value while a transaction is open on this thread,
    /// the committed value otherwise.
    pub fn value<R>(&self, project: impl FnOnce(&V) -> R) -> R {
        let lock = self.slot.lock();
        {
            let slot = borrow_slot(&lock);
            if slot.depth > 0 {
                return project(slot.working());
            }
        }
        let mut slot = borrow_slot_mut(&lock);
        project(slot.committed.force())
    }

    /// Clone the current value
    pub fn get(&self) -> V {
        self.value(V::clone)
    }

    /// Run `operation` as a scoped mutation
    ///
    /// The outermost call snapshots the committed value into the working slot;
    /// nested calls share that slot. When the outermost call returns (or
    /// unwinds) the working value is committed and the change callback fires.
    /// Whatever `operation` returns, `Err` included, is handed back unchanged.
    pub fn with_value<R>(&self, operation: impl FnOnce(&mut Working<'_, V>) -> R) -> R {
        let lock = self.slot.lock();
        let depth = {
            let mut slot = borrow_slot_mut(&lock);
            if slot.depth == 0 {
                let snapshot = slot.committed.force().clone();
                slot.working = Some(snapshot);
            }
            slot.depth += 1;
            slot.depth
        };
        // Nothing may panic between the increment above and this frame
        let _frame = Frame {
            guard: self,
            lock: Some(lock),
        };

        self.counters.record_entry(depth);
        if self.config.warn_depth.checked_add(1) == Some(depth) {
            warn!(
                guard = %self.config.label,
                depth,
                warn_depth = self.config.warn_depth,
                "Scoped mutation nesting exceeds configured depth"
            );
        }

        let mut working = Working { guard: self, depth };
        operation(&mut working)
    }

    /// Apply `f` to the value inside a scoped mutation
    pub fn update<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        self.with_value(|working| working.update(f))
    }

    /// Overwrite the value
    ///
    /// Outside a transaction this commits immediately and fires the change
    /// callback. Inside one (on the holding thread) it replaces the working
    /// value, which the outermost `with_value` commits later.
    pub fn set_value(&self, value: V) {
        let lock = self.slot.lock();
        {
            let mut slot = borrow_slot_mut(&lock);
            if slot.depth > 0 {
                slot.working = Some(value);
                self.counters.record_overwrite();
                return;
            }
            self.commit(&mut slot, value, true);
        }
        drop(lock);
        self.dispatcher.drain(&self.config.label);
    }

    /// Number of scoped mutations currently open
    ///
    /// Non-zero only when called from the thread holding the lock, since other
    /// threads wait for the outermost commit before they can observe it.
    pub fn depth(&self) -> usize {
        let lock = self.slot.lock();
        let depth = borrow_slot(&lock).depth;
        depth
    }

    /// Whether a scoped mutation is open on this thread
    pub fn in_transaction(&self) -> bool {
        self.depth() > 0
    }

    /// Whether a deferred initial value has been produced yet
    pub fn is_initialized(&self) -> bool {
        let lock = self.slot.lock();
        let ready = borrow_slot(&lock).committed.is_ready();
        ready
    }

    /// Counter snapshot
    pub fn stats(&self) -> GuardStats {
        self.counters.snapshot()
    }

    /// Config this guard was built with
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Commit `value` as the new stored value. Called with the lock held.
    fn commit(&self, slot: &mut Slot<V>, value: V, notify: bool) -> u64 {
        let commit_seq = self.counters.record_commit();
        slot.committed = Committed::Ready(value);
        trace!(guard = %self.config.label, commit_seq, "Committed guarded value");
        if notify && self.dispatcher.is_active() {
            let delivered = slot.committed.force().clone();
            self.dispatcher.enqueue(commit_seq, delivered);
        }
        commit_seq
    }

    #[cfg(test)]
    pub(crate) fn abandon_transaction(&self) {
        let lock = self.slot.lock();
        let mut slot = borrow_slot_mut(&lock);
        let snapshot = slot.committed.force().clone();
        slot.working = Some(snapshot);
        slot.depth = 1;
    }
}

impl<V: Clone + Default> Default for GuardedValue<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V> Drop for GuardedValue<V> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().get_mut();
        if let Some(abandoned) = slot.working.take() {
            warn!(
                guard = %self.config.label,
                depth = slot.depth,
                "Discarding uncommitted working value"
            );
            slot.depth = 0;
            drop(abandoned);
        }
    }
}

impl<V> fmt::Debug for GuardedValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // None while another thread holds the lock
        let depth = match self.slot.try_lock() {
            Some(lock) => {
                let depth = lock.try_borrow().map(|slot| slot.depth).ok();
                depth
            }
            None => None,
        };
        f.debug_struct("GuardedValue")
            .field("label", &self.config.label)
            .field("depth", &depth)
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}

/// Closes one scoped-mutation level on every exit path
struct Frame<'g, V: Clone> {
    guard: &'g GuardedValue<V>,
    lock: Option<ReentrantMutexGuard<'g, RefCell<Slot<V>>>>,
}

impl<V: Clone> Drop for Frame<'_, V> {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        let guard = self.guard;
        let unwinding = std::thread::panicking();
        {
            let mut slot = borrow_slot_mut(&lock);
            slot.depth -= 1;
            if slot.depth > 0 {
                return;
            }
            let Some(value) = slot.working.take() else {
                return;
            };
            if unwinding {
                debug!(guard = %guard.config.label, "Committing guarded value during unwind");
            }
            guard.commit(&mut slot, value, !unwinding || guard.config.notify_on_unwind);
        }
        drop(lock);
        if !unwinding || guard.config.notify_on_unwind {
            guard.dispatcher.drain(&guard.config.label);
        }
    }
}

/// Handle onto the working value of an open scoped mutation
///
/// Each access takes a short borrow of the shared working slot, so nested
/// `with_value` / `set_value` calls made between accesses write to the same
/// value this handle reads. Closures passed to [`Working::read`] and
/// [`Working::update`] must not call back into the guard.
pub struct Working<'g, V: Clone> {
    guard: &'g GuardedValue<V>,
    depth: usize,
}

impl<'g, V: Clone> Working<'g, V> {
    /// Nesting level of the scoped mutation this handle belongs to (1 = root)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The guard this transaction is open on
    pub fn guard(&self) -> &'g GuardedValue<V> {
        self.guard
    }

    /// Read the working value
    pub fn read<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let lock = self.guard.slot.lock();
        let slot = borrow_slot(&lock);
        f(slot.working())
    }

    /// Mutate the working value in place
    pub fn update<R>(&mut self, f: impl FnOnce(&mut V) -> R) -> R {
        let lock = self.guard.slot.lock();
        let mut slot = borrow_slot_mut(&lock);
        f(slot.working_mut())
    }

    /// Clone the working value
    pub fn get(&self) -> V {
        self.read(V::clone)
    }

    /// Replace the working value
    pub fn set(&mut self, value: V) {
        self.replace(value);
    }

    /// Replace the working value, returning the previous one
    pub fn replace(&mut self, value: V) -> V {
        self.update(|current| std::mem::replace(current, value))
    }
}

impl<V: Clone> fmt::Debug for Working<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Working")
            .field("guard", &self.guard.config.label)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Builder for a [`GuardedValue`] with a change callback or custom config
pub struct GuardedValueBuilder<V> {
    committed: Committed<V>,
    on_change: Option<ChangeCallback<V>>,
    config: GuardConfig,
}

impl<V: Clone> GuardedValueBuilder<V> {
    /// Callback fired with the committed value after each root commit
    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(callback));
        self
    }

    /// Use `config` instead of the default
    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for a default config with a custom label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Build the guard
    pub fn build(self) -> GuardedValue<V> {
        GuardedValue::from_parts(self.committed, self.on_change, self.config)
    }
}

fn borrow_slot<'a, V>(cell: &'a RefCell<Slot<V>>) -> Ref<'a, Slot<V>> {
    cell.try_borrow()
        .unwrap_or_else(|_| panic!("{}", REENTERED_FROM_CLOSURE))
}

fn borrow_slot_mut<'a, V>(cell: &'a RefCell<Slot<V>>) -> RefMut<'a, Slot<V>> {
    cell.try_borrow_mut()
        .unwrap_or_else(|_| panic!("{}", REENTERED_FROM_CLOSURE))
}
