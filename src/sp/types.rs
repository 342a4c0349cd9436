//! Core Savings Plans vocabulary.
//!
//! Every discriminator in the purchase pipeline is a closed sum so that
//! match exhaustiveness is checked at compile time:
//! - `SpCategory` with its vendor-imposed (term, payment) constraints
//! - `Term` / `PaymentOption`
//! - `PurchaseIntent`, the contract between scheduler and purchaser
//! - `PurchaseOutcome` / `SkipReason`, the per-intent execution result

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Savings Plan family. Each family carries its own vendor constraints on
/// which (term, payment option) combinations can be purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpCategory {
    Compute,
    Database,
    Sagemaker,
}

impl SpCategory {
    pub const ALL: [SpCategory; 3] = [
        SpCategory::Compute,
        SpCategory::Database,
        SpCategory::Sagemaker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpCategory::Compute => "compute",
            SpCategory::Database => "database",
            SpCategory::Sagemaker => "sagemaker",
        }
    }

    /// Purchasable (term, payment option) pairs for this category, in the
    /// canonical `(term, payment_option)` order used everywhere fragments
    /// are emitted or coalesced.
    pub fn allowed_pairs(&self) -> &'static [(Term, PaymentOption)] {
        match self {
            SpCategory::Compute => &[
                (Term::OneYear, PaymentOption::AllUpfront),
                (Term::OneYear, PaymentOption::PartialUpfront),
                (Term::OneYear, PaymentOption::NoUpfront),
                (Term::ThreeYear, PaymentOption::AllUpfront),
                (Term::ThreeYear, PaymentOption::PartialUpfront),
                (Term::ThreeYear, PaymentOption::NoUpfront),
            ],
            // Vendor-imposed: database plans only exist as 1-year / no-upfront.
            SpCategory::Database => &[(Term::OneYear, PaymentOption::NoUpfront)],
            SpCategory::Sagemaker => &[(Term::OneYear, PaymentOption::AllUpfront)],
        }
    }

    pub fn allows(&self, term: Term, payment_option: PaymentOption) -> bool {
        self.allowed_pairs().contains(&(term, payment_option))
    }
}

impl fmt::Display for SpCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commitment term. Ordering is declaration order (1-year before 3-year)
/// and is relied on for deterministic fragment ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    OneYear,
    ThreeYear,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::OneYear => "one_year",
            Term::ThreeYear => "three_year",
        }
    }

    pub fn years(&self) -> u32 {
        match self {
            Term::OneYear => 1,
            Term::ThreeYear => 3,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment option. Ordering is declaration order and is relied on for
/// deterministic fragment ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOption {
    AllUpfront,
    PartialUpfront,
    NoUpfront,
}

impl PaymentOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOption::AllUpfront => "all_upfront",
            PaymentOption::PartialUpfront => "partial_upfront",
            PaymentOption::NoUpfront => "no_upfront",
        }
    }
}

impl fmt::Display for PaymentOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed purchase, produced by the scheduler and consumed by the
/// purchaser through the durable queue.
///
/// Immutable once enqueued. The purchaser re-validates every field at
/// dequeue time and discards intents that fail [`PurchaseIntent::validate`]
/// without executing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseIntent {
    pub category: SpCategory,
    pub term: Term,
    pub payment_option: PaymentOption,

    /// Hourly commitment to purchase, in account currency per hour. > 0.
    pub hourly_commitment: f64,

    /// Fraction of the total commitment paid upfront. Pinned to 1.0 for
    /// all-upfront and 0.0 for no-upfront.
    pub upfront_fraction: f64,

    /// Percentage points this purchase is expected to add to the
    /// category's coverage, computed against the denominator observed at
    /// scheduling time.
    pub projected_gain_pct: f64,

    /// Vendor offering this intent resolves to at purchase time.
    pub offering_id: String,

    /// Vendor recommendation this intent was derived from, kept for audit.
    pub source_recommendation_id: String,

    /// Stable dedup key; identical intents re-submitted to the vendor
    /// within the dedup window coalesce into a single plan.
    pub idempotency_token: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq)]
pub enum IntentError {
    #[error("hourly commitment {0} must be finite and > 0")]
    NonPositiveCommitment(f64),

    #[error("{term}/{payment_option} is not purchasable for {category}")]
    DisallowedPair {
        category: SpCategory,
        term: Term,
        payment_option: PaymentOption,
    },

    #[error("upfront fraction {fraction} is invalid for {payment_option}")]
    InvalidUpfrontFraction {
        payment_option: PaymentOption,
        fraction: f64,
    },

    #[error("projected gain {0} must be a finite percentage in [0, 100]")]
    InvalidProjectedGain(f64),

    #[error("{0} must not be empty")]
    MissingField(&'static str),
}

impl PurchaseIntent {
    /// Checks every field invariant. An intent failing any check is
    /// discarded at dequeue time without execution.
    pub fn validate(&self) -> Result<(), IntentError> {
        if !self.hourly_commitment.is_finite() || self.hourly_commitment <= 0.0 {
            return Err(IntentError::NonPositiveCommitment(self.hourly_commitment));
        }

        if !self.category.allows(self.term, self.payment_option) {
            return Err(IntentError::DisallowedPair {
                category: self.category,
                term: self.term,
                payment_option: self.payment_option,
            });
        }

        let fraction_ok = match self.payment_option {
            PaymentOption::AllUpfront => self.upfront_fraction == 1.0,
            PaymentOption::NoUpfront => self.upfront_fraction == 0.0,
            PaymentOption::PartialUpfront => {
                self.upfront_fraction.is_finite()
                    && (0.0..=1.0).contains(&self.upfront_fraction)
            }
        };
        if !fraction_ok {
            return Err(IntentError::InvalidUpfrontFraction {
                payment_option: self.payment_option,
                fraction: self.upfront_fraction,
            });
        }

        if !self.projected_gain_pct.is_finite()
            || !(0.0..=100.0).contains(&self.projected_gain_pct)
        {
            return Err(IntentError::InvalidProjectedGain(self.projected_gain_pct));
        }

        if self.offering_id.is_empty() {
            return Err(IntentError::MissingField("offering_id"));
        }
        if self.idempotency_token.is_empty() {
            return Err(IntentError::MissingField("idempotency_token"));
        }

        Ok(())
    }
}

/// Result of processing a single intent in a purchaser run.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Success { plan_id: String },
    Skipped { reason: SkipReason },
    Failed { code: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The queue message did not parse into a valid intent.
    InvalidIntent,
    /// Executing the intent would push coverage above the hard cap.
    CapExceeded,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InvalidIntent => "invalid_intent",
            SkipReason::CapExceeded => "cap_exceeded",
        }
    }
}
