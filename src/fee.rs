//! Fee rate handling
//!
//! Fee rates arrive from an external estimation service as a single quoted
//! satoshi-per-byte figure; the wallet presents a min/normal/priority
//! triple derived from it.

use serde::{Deserialize, Serialize};

/// Satoshi per (virtual) byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeeRate(pub u64);

impl FeeRate {
    /// Total fee for a transaction of `size` bytes.
    pub fn fee_for(&self, size: usize) -> u64 {
        self.0.saturating_mul(size as u64)
    }
}

/// The three rates offered to the user, floor-rounded from a base quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub min: FeeRate,
    pub normal: FeeRate,
    pub priority: FeeRate,
}

impl FeeEstimate {
    /// min = 0.8x, normal = 1.0x, priority = 1.2x of the quoted base rate.
    pub fn from_base(base: FeeRate) -> Self {
        Self {
            min: FeeRate(base.0 * 8 / 10),
            normal: base,
            priority: FeeRate(base.0 * 12 / 10),
        }
    }
}
