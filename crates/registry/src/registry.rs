//! Comparator registry on top of a guarded table
//!
//! Registrations go through `GuardedValue::with_value`, so a batch applies
//! atomically with respect to other threads. `reset_defaults` opens its own
//! scoped mutation and is therefore safe to call from inside an open batch:
//! it nests into the batch's transaction instead of deadlocking, and
//! registrations made after it in the same batch are kept.
//!
//! ## Lookup
//!
//! `ComparatorRegistry::current()` resolves, in order:
//! 1. the table bound for this thread through `strata_concurrency::scope`
//! 2. the process-wide registry
//!
//! Tests wrap their body in `ComparatorRegistry::isolated` to get a private
//! registry that code under test finds through `current()`.

use crate::table::{ComparatorFn, ComparatorTable};
use once_cell::sync::Lazy;
use std::sync::Arc;
use strata_concurrency::{scope, GuardedValue, Working};
use strata_core::{GuardConfig, GuardError, GuardResult};
use tracing::debug;

/// Process-wide registry used when no table is bound in scope
static GLOBAL: Lazy<ComparatorRegistry> = Lazy::new(ComparatorRegistry::new);

/// Type-keyed comparator registry
///
/// Cloning yields another handle onto the same guarded table.
#[derive(Clone, Debug)]
pub struct ComparatorRegistry {
    table: Arc<GuardedValue<ComparatorTable>>,
}

impl ComparatorRegistry {
    /// Registry preloaded with the default comparators
    pub fn new() -> Self {
        Self::with_table(ComparatorTable::defaults())
    }

    /// Registry with no comparators
    pub fn empty() -> Self {
        Self::with_table(ComparatorTable::new())
    }

    fn with_table(table: ComparatorTable) -> Self {
        Self::from_guard(Arc::new(GuardedValue::with_config(
            table,
            GuardConfig::labeled("comparator-registry"),
        )))
    }

    /// Registry over an existing guarded table
    pub fn from_guard(table: Arc<GuardedValue<ComparatorTable>>) -> Self {
        Self { table }
    }

    /// The process-wide registry
    pub fn global() -> &'static ComparatorRegistry {
        &GLOBAL
    }

    /// Registry bound in the current scope, else the process-wide one
    pub fn current() -> ComparatorRegistry {
        match scope::current::<ComparatorTable>() {
            Some(table) => Self::from_guard(table),
            None => Self::global().clone(),
        }
    }

    /// Run `f` with a private registry (holding the defaults) bound as current
    pub fn isolated<R>(f: impl FnOnce(&ComparatorRegistry) -> R) -> R {
        let guard = GuardedValue::builder(ComparatorTable::defaults())
            .label("isolated-comparator-registry")
            .build();
        scope::isolated_guard(guard, |table| f(&Self::from_guard(Arc::clone(table))))
    }

    /// The guarded table backing this registry
    pub fn guard(&self) -> &Arc<GuardedValue<ComparatorTable>> {
        &self.table
    }

    /// Insert or replace the comparator for `T`
    pub fn register<T, F>(&self, compare: F)
    where
        T: 'static,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.batch(|batch| {
            batch.register::<T, F>(compare);
        });
    }

    /// Apply several registrations in one scoped mutation
    pub fn batch<R>(&self, f: impl FnOnce(&mut RegistrationBatch<'_, '_>) -> R) -> R {
        self.table.with_value(|working| {
            let mut batch = RegistrationBatch {
                registry: self,
                working,
            };
            f(&mut batch)
        })
    }

    /// Replace every registration with the defaults
    ///
    /// Inside an open batch the replacement lands in the batch's working
    /// table and is committed with it.
    pub fn reset_defaults(&self) {
        self.table.with_value(|working| {
            debug!(depth = working.depth(), "Resetting comparators to defaults");
            working.set(ComparatorTable::defaults());
        });
    }

    /// Compare two values with the registered comparator for `T`
    ///
    /// The comparator runs outside the registry lock.
    pub fn compare<T: 'static>(&self, a: &T, b: &T) -> GuardResult<bool> {
        let compare = self.comparator::<T>()?;
        Ok(compare(a, b))
    }

    /// Registered comparator for `T`
    pub fn comparator<T: 'static>(&self) -> GuardResult<ComparatorFn<T>> {
        self.table
            .value(ComparatorTable::get::<T>)
            .ok_or(GuardError::ComparatorMissing {
                type_name: std::any::type_name::<T>(),
            })
    }

    /// Whether a comparator for `T` is registered
    pub fn contains<T: 'static>(&self) -> bool {
        self.table.value(ComparatorTable::contains::<T>)
    }

    /// Number of registered comparators
    pub fn len(&self) -> usize {
        self.table.value(ComparatorTable::len)
    }

    /// Whether no comparator is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the registered types, sorted
    pub fn registered_types(&self) -> Vec<&'static str> {
        self.table.value(ComparatorTable::type_names)
    }
}

impl Default for ComparatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registrations applied within one open scoped mutation
pub struct RegistrationBatch<'b, 'g> {
    registry: &'b ComparatorRegistry,
    working: &'b mut Working<'g, ComparatorTable>,
}

impl RegistrationBatch<'_, '_> {
    /// Insert or replace the comparator for `T`
    pub fn register<T, F>(&mut self, compare: F) -> &mut Self
    where
        T: 'static,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let replaced = self.working.update(|table| table.insert::<T, F>(compare));
        debug!(
            type_name = std::any::type_name::<T>(),
            replaced,
            "Registered comparator"
        );
        self
    }

    /// Insert or replace the comparator for `T` with `PartialEq`
    pub fn register_eq<T: PartialEq + 'static>(&mut self) -> &mut Self {
        self.working.update(ComparatorTable::insert_eq::<T>);
        self
    }

    /// Remove the comparator for `T`
    pub fn unregister<T: 'static>(&mut self) -> &mut Self {
        self.working.update(ComparatorTable::remove::<T>);
        self
    }

    /// Reset to the defaults through the registry, nesting into this batch
    pub fn reset_defaults(&mut self) -> &mut Self {
        self.registry.reset_defaults();
        self
    }

    /// Whether the batch's working table has a comparator for `T`
    pub fn contains<T: 'static>(&self) -> bool {
        self.working.read(ComparatorTable::contains::<T>)
    }

    /// The registry this batch writes to
    pub fn registry(&self) -> &ComparatorRegistry {
        self.registry
    }
}
