//! Dynamic capacity weights for the weighted strategies.
//!
//! # Algorithm
//! ```text
//! load      = 0.6 * cpu + 0.4 * memory
//! idle_rate = 100 - load          (floored at 0)
//! if |previous_load - load| > critical_value:
//!     weight = (adjustment_factor + idle_rate) * process_capacity
//! ```
//!
//! # Design Decisions
//! - Only active under WeightedComposite and WeightedLeastConnections
//! - `previous_load` lives on the member and moves only when the weight is
//!   recomputed; a member that has never been weighed is always recomputed
//! - Driven by the heartbeat cadence, never inline with selection

use crate::config::WeightConfig;
use crate::load_balancer::member::Member;
use crate::load_balancer::strategy::Strategy;

/// Recomputes member weights from load movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightAdapter {
    /// Minimum load movement that triggers a recompute.
    pub critical_value: f64,
    /// Constant added to the idle rate.
    pub adjustment_factor: f64,
}

impl Default for WeightAdapter {
    fn default() -> Self {
        Self {
            critical_value: 5.0,
            adjustment_factor: 5.0,
        }
    }
}

impl From<&WeightConfig> for WeightAdapter {
    fn from(config: &WeightConfig) -> Self {
        Self {
            critical_value: config.critical_value,
            adjustment_factor: config.adjustment_factor,
        }
    }
}

impl WeightAdapter {
    /// Adjust `member`'s weight under `strategy`.
    ///
    /// Returns the new weight when it was recomputed.
    pub fn adjust(&self, strategy: Strategy, member: &mut Member) -> Option<f64> {
        if !strategy.is_weighted() {
            return None;
        }

        let load = member.current_load();
        let moved = match member.previous_load() {
            Some(previous) => (previous - load).abs() > self.critical_value,
            None => true,
        };
        if !moved {
            return None;
        }

        let idle_rate = (100.0 - load).max(0.0);
        member.weight = (self.adjustment_factor + idle_rate) * member.process_capacity;
        member.set_previous_load(load);
        Some(member.weight)
    }
}
