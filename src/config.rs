//! Typed, validated pipeline configuration.
//!
//! Everything that can be rejected is rejected at load time, before any
//! I/O: portfolio weights that do not sum to one, weights on pairs the
//! category cannot purchase, a cap below the target, strategy parameters
//! out of range. A run never starts on a half-valid configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::portfolio::{MixError, PortfolioMix};
use crate::queue::QueueMode;
use crate::sp::types::{PaymentOption, SpCategory};
use crate::strategy::{InvalidStrategy, Strategy};

/// Per-category purchase plan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub mix: PortfolioMix,

    /// Upfront share for partial-upfront fragments, in percent.
    /// Defaults to 50 when unset.
    #[serde(default)]
    pub partial_upfront_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub strategy: Strategy,

    /// Coverage the strategies steer toward, in percent.
    pub coverage_target_percent: f64,

    /// Hard ceiling the purchaser enforces per intent. Never below the
    /// target.
    pub max_coverage_cap: f64,

    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    #[serde(default = "default_min_data_days")]
    pub min_data_days: u32,

    /// Plans ending within this many days count as already expired when
    /// coverage is computed.
    #[serde(default = "default_renewal_window_days")]
    pub renewal_window_days: u32,

    pub sp_plans: BTreeMap<SpCategory, PlanConfig>,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub send_no_action: bool,

    #[serde(default = "default_true")]
    pub notify_on_error: bool,

    #[serde(default = "default_queue_mode")]
    pub queue_mode: QueueMode,

    #[serde(default)]
    pub assume_role_arn: Option<String>,

    #[serde(default = "default_purchase_batch_size")]
    pub purchase_batch_size: usize,

    #[serde(default = "default_wall_clock_deadline_seconds")]
    pub wall_clock_deadline_seconds: u64,

    /// Per-call timeout for outbound provider calls.
    #[serde(default = "default_api_timeout_seconds")]
    pub api_timeout_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_lookback_days() -> u32 {
    30
}

fn default_min_data_days() -> u32 {
    14
}

fn default_renewal_window_days() -> u32 {
    30
}

fn default_queue_mode() -> QueueMode {
    QueueMode::Replace
}

fn default_purchase_batch_size() -> usize {
    10
}

fn default_wall_clock_deadline_seconds() -> u64 {
    600
}

fn default_api_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid strategy: {0}")]
    Strategy(#[from] InvalidStrategy),

    #[error("{category} portfolio mix: {source}")]
    Mix {
        category: SpCategory,
        source: MixError,
    },

    #[error("coverage_target_percent {0} must be within [0, 100]")]
    TargetOutOfRange(f64),

    #[error("max_coverage_cap {cap} must be within [{target}, 100]")]
    CapOutOfRange { cap: f64, target: f64 },

    #[error("partial_upfront_percent {0} must be within [0, 100]")]
    PartialUpfrontOutOfRange(f64),

    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;

        if !self.coverage_target_percent.is_finite()
            || !(0.0..=100.0).contains(&self.coverage_target_percent)
        {
            return Err(ConfigError::TargetOutOfRange(self.coverage_target_percent));
        }

        if !self.max_coverage_cap.is_finite()
            || self.max_coverage_cap < self.coverage_target_percent
            || self.max_coverage_cap > 100.0
        {
            return Err(ConfigError::CapOutOfRange {
                cap: self.max_coverage_cap,
                target: self.coverage_target_percent,
            });
        }

        if self.lookback_days == 0 {
            return Err(ConfigError::NonPositive("lookback_days"));
        }
        if self.min_data_days == 0 {
            return Err(ConfigError::NonPositive("min_data_days"));
        }
        if self.purchase_batch_size == 0 {
            return Err(ConfigError::NonPositive("purchase_batch_size"));
        }
        if self.wall_clock_deadline_seconds == 0 {
            return Err(ConfigError::NonPositive("wall_clock_deadline_seconds"));
        }
        if self.api_timeout_seconds == 0 {
            return Err(ConfigError::NonPositive("api_timeout_seconds"));
        }

        for (&category, plan) in &self.sp_plans {
            plan.mix
                .validate_for(category)
                .map_err(|source| ConfigError::Mix { category, source })?;

            if let Some(pct) = plan.partial_upfront_percent {
                if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
                    return Err(ConfigError::PartialUpfrontOutOfRange(pct));
                }
            }
        }

        Ok(())
    }

    pub fn enabled_categories(&self) -> Vec<SpCategory> {
        self.sp_plans
            .iter()
            .filter(|(_, plan)| plan.enabled)
            .map(|(&category, _)| category)
            .collect()
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }

    pub fn wall_clock_deadline(&self) -> Duration {
        Duration::from_secs(self.wall_clock_deadline_seconds)
    }

    /// Upfront fraction an intent carries for a given payment option.
    pub fn upfront_fraction(&self, category: SpCategory, payment_option: PaymentOption) -> f64 {
        match payment_option {
            PaymentOption::AllUpfront => 1.0,
            PaymentOption::NoUpfront => 0.0,
            PaymentOption::PartialUpfront => {
                let pct = self
                    .sp_plans
                    .get(&category)
                    .and_then(|plan| plan.partial_upfront_percent)
                    .unwrap_or(50.0);
                pct / 100.0
            }
        }
    }
}
