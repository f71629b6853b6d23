//! Guard metrics
//!
//! Counters use Relaxed ordering: they are observational only and do not
//! synchronize any other memory operations. Every update happens while the
//! guard lock is held, so a snapshot taken from the lock holder is exact.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Point-in-time view of a guard's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    /// Root commits, including direct overwrites outside a transaction
    pub commits: u64,
    /// Scoped mutations entered while another was already open
    pub nested_entries: u64,
    /// Deepest nesting observed
    pub max_depth: usize,
    /// `set_value` calls that replaced an open working value
    pub overwrites: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    commits: AtomicU64,
    nested_entries: AtomicU64,
    max_depth: AtomicUsize,
    overwrites: AtomicU64,
}

impl Counters {
    pub(crate) fn record_entry(&self, depth: usize) {
        if depth > 1 {
            self.nested_entries.fetch_add(1, Ordering::Relaxed);
        }
        self.max_depth.fetch_max(depth, Ordering::Relaxed);
    }

    /// Returns the new commit count, used as the commit sequence number
    pub(crate) fn record_commit(&self) -> u64 {
        self.commits.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_overwrite(&self) {
        self.overwrites.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> GuardStats {
        GuardStats {
            commits: self.commits.load(Ordering::Relaxed),
            nested_entries: self.nested_entries.load(Ordering::Relaxed),
            max_depth: self.max_depth.load(Ordering::Relaxed),
            overwrites: self.overwrites.load(Ordering::Relaxed),
        }
    }
}
