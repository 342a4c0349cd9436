//! Purchase sizing strategies.
//!
//! A strategy is a pure function from (current coverage, target, vendor
//! suggestion) to an hourly commitment to buy. Identical inputs produce
//! identical outputs bit-for-bit; no strategy performs I/O.
//!
//! Common preconditions for every variant:
//! - a non-positive suggestion buys nothing
//! - coverage at or above target buys nothing (ties count as reached)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inputs to one sizing decision, all percentages in [0, 100].
///
/// `full_gain_pct` is the coverage gain (in percentage points) that
/// purchasing the whole suggested commitment would produce; the caller
/// derives it from the on-demand-equivalent denominator observed at
/// scheduling time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyInput {
    pub current_pct: f64,
    pub target_pct: f64,
    pub recommended_hourly: f64,
    pub full_gain_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Strategy {
    /// Always buy a fixed fraction of the suggestion.
    Fixed { max_purchase_percent: f64 },

    /// Start at the maximum fraction and halve until the projected
    /// coverage no longer overshoots the target. Below the minimum
    /// fraction, clamp to it; slight overshoot at the minimum is
    /// acceptable and the purchaser's hard cap is the final safety net.
    Dichotomy {
        max_purchase_percent: f64,
        min_purchase_percent: f64,
    },

    /// Like `fixed`, but does nothing while the remaining gap to target
    /// is below a threshold.
    Conservative {
        min_gap_threshold: f64,
        max_purchase_percent: f64,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidStrategy {
    #[error("max_purchase_percent {0} must be within (0, 100]")]
    MaxPurchaseOutOfRange(f64),

    #[error("min_purchase_percent {min} must be within (0, {max}]")]
    MinPurchaseOutOfRange { min: f64, max: f64 },

    #[error("min_gap_threshold {0} must be within [0, 100]")]
    GapThresholdOutOfRange(f64),
}

impl Strategy {
    pub fn validate(&self) -> Result<(), InvalidStrategy> {
        let check_max = |max: f64| {
            if max.is_finite() && max > 0.0 && max <= 100.0 {
                Ok(())
            } else {
                Err(InvalidStrategy::MaxPurchaseOutOfRange(max))
            }
        };

        match *self {
            Strategy::Fixed {
                max_purchase_percent,
            } => check_max(max_purchase_percent),
            Strategy::Dichotomy {
                max_purchase_percent,
                min_purchase_percent,
            } => {
                check_max(max_purchase_percent)?;
                if min_purchase_percent.is_finite()
                    && min_purchase_percent > 0.0
                    && min_purchase_percent <= max_purchase_percent
                {
                    Ok(())
                } else {
                    Err(InvalidStrategy::MinPurchaseOutOfRange {
                        min: min_purchase_percent,
                        max: max_purchase_percent,
                    })
                }
            }
            Strategy::Conservative {
                min_gap_threshold,
                max_purchase_percent,
            } => {
                check_max(max_purchase_percent)?;
                if min_gap_threshold.is_finite() && (0.0..=100.0).contains(&min_gap_threshold) {
                    Ok(())
                } else {
                    Err(InvalidStrategy::GapThresholdOutOfRange(min_gap_threshold))
                }
            }
        }
    }

    /// Upper bound on the fraction of the suggestion any decision buys.
    pub fn max_purchase_percent(&self) -> f64 {
        match *self {
            Strategy::Fixed {
                max_purchase_percent,
            }
            | Strategy::Dichotomy {
                max_purchase_percent,
                ..
            }
            | Strategy::Conservative {
                max_purchase_percent,
                ..
            } => max_purchase_percent,
        }
    }

    /// Hourly commitment to purchase. Deterministic and side-effect free.
    pub fn decide(&self, input: &StrategyInput) -> f64 {
        // The comparison shape also rejects NaN suggestions.
        if !(input.recommended_hourly > 0.0) {
            return 0.0;
        }
        if input.current_pct >= input.target_pct {
            return 0.0;
        }

        match *self {
            Strategy::Fixed {
                max_purchase_percent,
            } => input.recommended_hourly * (max_purchase_percent / 100.0),

            Strategy::Dichotomy {
                max_purchase_percent,
                min_purchase_percent,
            } => {
                let min_fraction = min_purchase_percent / 100.0;
                let mut fraction = max_purchase_percent / 100.0;

                while input.current_pct + fraction * input.full_gain_pct > input.target_pct {
                    fraction /= 2.0;
                    if fraction < min_fraction {
                        fraction = min_fraction;
                        break;
                    }
                }

                input.recommended_hourly * fraction
            }

            Strategy::Conservative {
                min_gap_threshold,
                max_purchase_percent,
            } => {
                let gap = input.target_pct - input.current_pct;
                if gap < min_gap_threshold {
                    0.0
                } else {
                    input.recommended_hourly * (max_purchase_percent / 100.0)
                }
            }
        }
    }
}
