//! Thread-scoped current-instance binding
//!
//! Code under test often reaches a shared guard through a lookup rather than
//! an explicit argument. `bind` makes a guard the current instance for its
//! value type on this thread for the duration of a closure; `isolated` does
//! the same with a freshly constructed guard, so every unit of work starts
//! from its own value.
//!
//! Bindings form a stack per value type: an inner binding shadows the outer
//! one and the outer one is restored when the closure exits, by return or by
//! panic.

use crate::guard::GuardedValue;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{GuardError, GuardResult};
use tracing::trace;

type Binding = Arc<dyn Any + Send + Sync>;

thread_local! {
    /// Bound guards per value type, innermost last
    static BINDINGS: RefCell<HashMap<TypeId, Vec<Binding>>> = RefCell::new(HashMap::new());
}

/// Run `f` with `guard` bound as the current instance for `V`
pub fn bind<V, R>(guard: Arc<GuardedValue<V>>, f: impl FnOnce() -> R) -> R
where
    V: Clone + Send + 'static,
{
    let type_id = TypeId::of::<V>();
    BINDINGS.with(|bindings| {
        bindings
            .borrow_mut()
            .entry(type_id)
            .or_default()
            .push(guard as Binding);
    });
    trace!(value_type = std::any::type_name::<V>(), "Bound guarded value");

    let _unbind = Unbind { type_id };
    f()
}

/// Run `f` with a fresh guard holding `initial` bound for `V`
pub fn isolated<V, R>(initial: V, f: impl FnOnce(&Arc<GuardedValue<V>>) -> R) -> R
where
    V: Clone + Send + 'static,
{
    isolated_guard(GuardedValue::new(initial), f)
}

/// Run `f` with `guard` bound for `V`, taking ownership of it
pub fn isolated_guard<V, R>(guard: GuardedValue<V>, f: impl FnOnce(&Arc<GuardedValue<V>>) -> R) -> R
where
    V: Clone + Send + 'static,
{
    let guard = Arc::new(guard);
    bind(Arc::clone(&guard), || f(&guard))
}

/// Innermost guard bound for `V` on this thread
pub fn current<V>() -> Option<Arc<GuardedValue<V>>>
where
    V: Clone + Send + 'static,
{
    let binding = BINDINGS.with(|bindings| {
        bindings
            .borrow()
            .get(&TypeId::of::<V>())
            .and_then(|stack| stack.last().cloned())
    })?;
    binding.downcast::<GuardedValue<V>>().ok()
}

/// Like [`current`], but an unbound type is an error
pub fn require<V>() -> GuardResult<Arc<GuardedValue<V>>>
where
    V: Clone + Send + 'static,
{
    current::<V>().ok_or(GuardError::ScopeNotBound {
        type_name: std::any::type_name::<V>(),
    })
}

/// Number of bindings for `V` on this thread
pub fn binding_depth<V: 'static>() -> usize {
    BINDINGS.with(|bindings| {
        bindings
            .borrow()
            .get(&TypeId::of::<V>())
            .map_or(0, Vec::len)
    })
}

/// Pops one binding when dropped
struct Unbind {
    type_id: TypeId,
}

impl Drop for Unbind {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown
        let _ = BINDINGS.try_with(|bindings| {
            let mut bindings = bindings.borrow_mut();
            if let Some(stack) = bindings.get_mut(&self.type_id) {
                stack.pop();
                if stack.is_empty() {
                    bindings.remove(&self.type_id);
                }
            }
        });
    }
}
