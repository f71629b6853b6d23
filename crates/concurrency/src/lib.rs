//! Concurrency layer for strata-guard
//!
//! This crate implements the reentrant guarded value with:
//! - GuardedValue: single value behind a reentrant lock
//! - Working: handle onto the shared working value of an open scoped mutation
//! - Ordered change notification, fired after the lock is released
//! - Thread-scoped current-instance binding for isolating units of work

#![warn(missing_docs)]
#![warn(clippy::all)]

mod dispatch;
pub mod guard;
pub mod scope;
mod stats;

pub use dispatch::ChangeCallback;
pub use guard::{GuardedValue, GuardedValueBuilder, Working};
pub use stats::GuardStats;
