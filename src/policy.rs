//! Resize tuning for dynamic tables.

use crate::error::{Result, TableError};

/// Tuning constants for the resize engine, fixed per table.
///
/// Defaults keep about one node per bucket and rehash once the table drifts
/// a factor of six away from that in either direction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResizePolicy {
    /// Desired average chain length.
    pub target_load: usize,
    /// Shrink when the count drops below `buckets * target_load / shrink_divisor`;
    /// the new bucket count is `buckets / shrink_divisor`.
    pub shrink_divisor: usize,
    /// Growth is considered once the count exceeds
    /// `buckets * target_load * grow_multiplier`.
    pub grow_multiplier: usize,
    /// A sampled lookup walking more nodes than this is expensive.
    pub expensive_chain_len: usize,
    /// Number of expensive sampled lookups that triggers growth.
    pub expensive_lookup_limit: usize,
    /// Only every `sample_interval`-th `find` is measured.
    pub sample_interval: usize,
}

impl ResizePolicy {
    pub const DEFAULT: Self = Self {
        target_load: 1,
        shrink_divisor: 6,
        grow_multiplier: 6,
        expensive_chain_len: 8,
        expensive_lookup_limit: 4,
        sample_interval: 16,
    };

    pub fn validate(&self) -> Result<()> {
        if self.shrink_divisor < 2 {
            return Err(TableError::InvalidPolicy("shrink_divisor must be at least 2"));
        }
        let fields = [
            (self.target_load, "target_load must be non-zero"),
            (self.grow_multiplier, "grow_multiplier must be non-zero"),
            (self.expensive_lookup_limit, "expensive_lookup_limit must be non-zero"),
            (self.sample_interval, "sample_interval must be non-zero"),
        ];
        match fields.iter().find(|(v, _)| *v == 0) {
            Some(&(_, msg)) => Err(TableError::InvalidPolicy(msg)),
            None => Ok(()),
        }
    }

    /// Entry-count thresholds for a table with `buckets` slots.
    pub fn watermarks(&self, buckets: usize) -> Watermarks {
        let desired = buckets.saturating_mul(self.target_load);
        Watermarks {
            low: desired / self.shrink_divisor,
            high: desired.saturating_mul(self.grow_multiplier),
        }
    }
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Entry-count thresholds derived from the bucket count.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Watermarks {
    pub low: usize,
    pub high: usize,
}
