//! Cache statistics

use serde::{Deserialize, Serialize};

/// Point-in-time counts over the URL cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently stored, expired ones included
    pub total: usize,

    /// Stored entries past their expiry
    pub expired: usize,

    /// Unexpired entries inside the near-expiry threshold
    pub near_expiry: usize,

    /// Resolutions currently running
    pub in_flight: usize,

    /// Groups with a running background refresh loop
    pub active_groups: usize,
}

impl CacheStats {
    /// Entries that can still be served.
    pub fn valid(&self) -> usize {
        self.total - self.expired
    }

    /// Share of stored entries that are still servable, 100 when empty.
    pub fn health_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }

        (self.valid() as f64 / self.total as f64) * 100.0
    }
}
