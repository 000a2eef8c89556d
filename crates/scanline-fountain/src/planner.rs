//! Redundancy planning: how many packets a sender should emit for `k` blocks.
//!
//! Small block counts get more slack because the peeling decoder stalls
//! more often when only a handful of degree-1 packets exist.

use serde::{Deserialize, Serialize};

use crate::error::{FountainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedundancyPolicy {
    /// Factor applied when `k < threshold`.
    pub small_factor: f64,
    /// Factor applied when `k >= threshold`.
    pub large_factor: f64,
    pub threshold: u32,
}

impl Default for RedundancyPolicy {
    fn default() -> Self {
        RedundancyPolicy {
            small_factor: 1.5,
            large_factor: 1.3,
            threshold: 20,
        }
    }
}

impl RedundancyPolicy {
    pub fn validate(&self) -> Result<()> {
        for (name, factor) in [("small_factor", self.small_factor), ("large_factor", self.large_factor)] {
            if !(factor.is_finite() && factor >= 1.0) {
                return Err(FountainError::InvalidConfig(format!(
                    "redundancy {name} {factor} must be >= 1.0"
                )));
            }
        }
        Ok(())
    }

    pub fn factor(&self, k: u32) -> f64 {
        if k < self.threshold {
            self.small_factor
        } else {
            self.large_factor
        }
    }

    /// Total packets to generate: `ceil(k * factor)`, at least `k + 1`.
    pub fn plan_count(&self, k: u32) -> u32 {
        // Integer per-mille arithmetic; 20 * 1.3 must not round up to 27.
        let permille = (self.factor(k) * 1000.0).round() as u64;
        let planned = (k as u64 * permille).div_ceil(1000);
        planned.max(k as u64 + 1).min(u32::MAX as u64) as u32
    }
}

/// [`RedundancyPolicy::plan_count`] with the default policy.
pub fn plan_count(k: u32) -> u32 {
    RedundancyPolicy::default().plan_count(k)
}
