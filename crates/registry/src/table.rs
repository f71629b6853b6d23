//! Comparator table keyed by type
//!
//! A plain value type: cloning is cheap (comparators are shared behind `Arc`)
//! so a `GuardedValue<ComparatorTable>` can snapshot it on every root entry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Equality comparator for values of type `T`
pub type ComparatorFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

#[derive(Clone)]
struct Entry {
    type_name: &'static str,
    /// Always a `ComparatorFn<T>` for the `T` this entry is keyed by
    compare: Arc<dyn Any + Send + Sync>,
}

/// Comparators by type, at most one per type
#[derive(Clone, Default)]
pub struct ComparatorTable {
    entries: HashMap<TypeId, Entry>,
}

fn equal<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

impl ComparatorTable {
    /// Table with no comparators
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding the built-in `PartialEq` comparators
    pub fn defaults() -> Self {
        let mut table = Self::new();
        table.insert_eq::<bool>();
        table.insert_eq::<char>();
        table.insert_eq::<()>();
        table.insert_eq::<i8>();
        table.insert_eq::<i16>();
        table.insert_eq::<i32>();
        table.insert_eq::<i64>();
        table.insert_eq::<i128>();
        table.insert_eq::<isize>();
        table.insert_eq::<u8>();
        table.insert_eq::<u16>();
        table.insert_eq::<u32>();
        table.insert_eq::<u64>();
        table.insert_eq::<u128>();
        table.insert_eq::<usize>();
        table.insert_eq::<f32>();
        table.insert_eq::<f64>();
        table.insert_eq::<String>();
        table.insert_eq::<&'static str>();
        table
    }

    /// Insert or replace the comparator for `T`
    ///
    /// Returns true if a comparator for `T` was replaced.
    pub fn insert<T, F>(&mut self, compare: F) -> bool
    where
        T: 'static,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let compare: ComparatorFn<T> = Arc::new(compare);
        self.entries
            .insert(
                TypeId::of::<T>(),
                Entry {
                    type_name: std::any::type_name::<T>(),
                    compare: Arc::new(compare),
                },
            )
            .is_some()
    }

    /// Insert or replace the comparator for `T` with `PartialEq`
    pub fn insert_eq<T: PartialEq + 'static>(&mut self) -> bool {
        self.insert(equal::<T>)
    }

    /// Remove the comparator for `T`, returning whether one existed
    pub fn remove<T: 'static>(&mut self) -> bool {
        self.entries.remove(&TypeId::of::<T>()).is_some()
    }

    /// Comparator for `T`, if registered
    pub fn get<T: 'static>(&self) -> Option<ComparatorFn<T>> {
        let entry = self.entries.get(&TypeId::of::<T>())?;
        let compare = entry.compare.downcast_ref::<ComparatorFn<T>>().cloned();
        debug_assert!(compare.is_some(), "comparator keyed under the wrong type");
        compare
    }

    /// Whether a comparator for `T` is registered
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered comparators
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no comparator is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the registered types, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ComparatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.type_names()).finish()
    }
}
