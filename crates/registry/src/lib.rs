//! Comparator registry for strata-guard
//!
//! A type-keyed table of equality comparators held in a
//! `GuardedValue<ComparatorTable>`. Batches of registrations, including a
//! reset to the defaults issued from inside an open batch, apply as one
//! scoped mutation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod registry;
pub mod table;

pub use registry::{ComparatorRegistry, RegistrationBatch};
pub use table::{ComparatorFn, ComparatorTable};
