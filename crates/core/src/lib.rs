//! Core types for strata-guard
//!
//! This crate defines the types shared by the guard and its collaborators:
//! - GuardError / GuardResult: Error type hierarchy
//! - GuardConfig: TOML-backed guard configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;

pub use config::{GuardConfig, DEFAULT_LABEL, DEFAULT_WARN_DEPTH};
pub use error::{GuardError, GuardResult};
