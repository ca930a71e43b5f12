//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a connection pool's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Connections currently checked out
    pub active: usize,
    /// Connections parked in the pool
    pub idle: usize,
    /// Callers blocked on a checkout
    pub waiting: usize,
    /// Upper bound on live connections
    pub max_size: usize,
    /// Connections opened over the pool's lifetime
    pub created: u64,
    pub closed: bool,
}

impl PoolStats {
    /// Live connections (checked out plus idle)
    pub fn total(&self) -> usize {
        self.active + self.idle
    }

    /// Share of `max_size` currently checked out, 0.0 to 1.0
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.active as f64 / self.max_size as f64
        }
    }

    /// Whether a new checkout would have to wait
    pub fn is_saturated(&self) -> bool {
        self.max_size > 0 && self.active >= self.max_size
    }
}
