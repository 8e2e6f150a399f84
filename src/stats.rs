/*!
 * Channel Statistics
 * Lock-free counters shared between the capture and drain paths
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of channel activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Occurrences recorded by the capture handler
    pub captured: u64,
    /// Events drained by consumers
    pub delivered: u64,
    /// Occurrences collapsed into an already-pending event (counting mode)
    pub coalesced: u64,
    /// Occurrences dropped into per-signal overflow counters (ordered mode)
    pub overflowed: u64,
}

/// Atomic channel statistics for lock-free updates
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Updated from signal context; atomics only, no locks
#[repr(C, align(64))]
pub(crate) struct AtomicChannelStats {
    captured: AtomicU64,
    delivered: AtomicU64,
    coalesced: AtomicU64,
    overflowed: AtomicU64,
}

impl AtomicChannelStats {
    pub(crate) const fn new() -> Self {
        Self {
            captured: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            overflowed: AtomicU64::new(0),
        }
    }

    /// Increment occurrences captured
    ///
    /// # Performance
    /// Hot path - called on every handler invocation
    #[inline(always)]
    pub(crate) fn inc_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment events delivered
    #[inline(always)]
    pub(crate) fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Add occurrences collapsed by a counting-mode drain
    #[inline(always)]
    pub(crate) fn add_coalesced(&self, count: u64) {
        self.coalesced.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment occurrences coalesced by a full capture queue
    #[inline(always)]
    pub(crate) fn inc_overflowed(&self) {
        self.overflowed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats (no locks required)
    ///
    /// # Note
    /// Values may not be perfectly consistent with each other due to
    /// concurrent updates, but each individual value is accurate. This is
    /// acceptable for monitoring.
    #[inline]
    pub(crate) fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            captured: self.captured.load(Ordering::Acquire),
            delivered: self.delivered.load(Ordering::Acquire),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
        }
    }
}

impl Default for AtomicChannelStats {
    fn default() -> Self {
        Self::new()
    }
}
