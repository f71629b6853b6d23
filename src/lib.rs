//! strata-guard - Reentrant transactional value guard
//!
//! A [`GuardedValue`] holds one value behind a reentrant lock. Scoped
//! mutations may nest arbitrarily deep on the same thread; every level works
//! on one shared working value, and the outermost level commits it.
//!
//! # Quick Start
//!
//! ```
//! use strata_guard::GuardedValue;
//!
//! let guard = GuardedValue::new(Vec::new());
//!
//! guard.with_value(|outer| {
//!     outer.update(|v| v.push(1));
//!     guard.with_value(|inner| inner.update(|v| v.push(2)));
//!     outer.update(|v| v.push(3));
//! });
//!
//! assert_eq!(guard.get(), vec![1, 2, 3]);
//! ```
//!
//! # Architecture
//!
//! - `strata-core`: errors and configuration
//! - `strata-concurrency`: the guard, change dispatch and scoped bindings
//! - `strata-registry`: a comparator registry built on the guard

pub use strata_concurrency::{
    scope, ChangeCallback, GuardStats, GuardedValue, GuardedValueBuilder, Working,
};
pub use strata_core::{GuardConfig, GuardError, GuardResult};
pub use strata_registry::{ComparatorFn, ComparatorRegistry, ComparatorTable, RegistrationBatch};
