//! Forgetting - lazy priority decay
//!
//! Decay is a pure function of (priority, elapsed ticks, parameters),
//! evaluated the moment an item is next touched. There is no background
//! sweep: untouched items simply carry a stale timestamp until they are
//! sampled again, which keeps per-cycle decay work proportional to the
//! number of touches rather than the container size.

use serde::{Deserialize, Serialize};

use super::priority::{is_live, Budget};

/// Decay curve applied on touch.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Forgetting {
    /// No decay. Priorities only change through explicit merges.
    #[default]
    None,
    /// Linear interpolation toward the quality floor over `rate` ticks.
    /// Durability stretches the effective rate: an item with durability
    /// 1.0 never decays.
    Linear {
        /// Ticks over which a zero-durability priority fully reaches its floor.
        rate: f32,
        /// Fraction of the item's quality that decay cannot cross.
        quality_floor: f32,
    },
    /// Exponential decay `p *= exp(-((1 - durability) / rate) * dt)`,
    /// clamped to the quality floor.
    Exponential {
        /// Time constant in ticks. Larger is slower.
        rate: f32,
        /// Fraction of the item's quality that decay cannot cross.
        quality_floor: f32,
    },
}

impl Forgetting {
    /// Decay `priority` by `elapsed` ticks for an item carrying `budget`.
    ///
    /// Tombstones pass through unchanged; elapsed <= 0 is a no-op. The
    /// result never increases: time passing only ever lowers priority.
    pub fn decay(&self, priority: f32, budget: &Budget, elapsed: i64) -> f32 {
        if !is_live(priority) || elapsed <= 0 {
            return priority;
        }
        let dt = elapsed as f32;
        match *self {
            Forgetting::None => priority,
            Forgetting::Linear {
                rate,
                quality_floor,
            } => {
                let floor = (quality_floor * budget.quality).clamp(0.0, 1.0);
                if priority <= floor || rate <= 0.0 {
                    return priority;
                }
                // Durability 1.0 stops decay entirely
                let fraction = (dt * (1.0 - budget.durability) / rate).clamp(0.0, 1.0);
                priority - (priority - floor) * fraction
            }
            Forgetting::Exponential {
                rate,
                quality_floor,
            } => {
                if rate <= 0.0 {
                    return priority;
                }
                let floor = (quality_floor * budget.quality).clamp(0.0, 1.0);
                let decayed = priority * (-((1.0 - budget.durability) / rate) * dt).exp();
                decayed.max(floor).min(priority)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
