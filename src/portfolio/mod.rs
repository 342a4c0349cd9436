//! Portfolio mix and commitment splitting.
//!
//! A single hourly commitment is split into one fragment per
//! (term, payment option) pair, weighted by the configured ratios.
//! Fragments are always produced in `(term, payment_option)` order so the
//! output is deterministic; dust below `min_fragment_hourly` coalesces
//! into the largest fragment (ties resolved by the same order).
//!
//! Mix validation happens at configuration load. A weight on a pair the
//! category cannot purchase is a configuration error, never a silent drop
//! at split time.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::sp::types::{PaymentOption, SpCategory, Term};

/// Tolerance for the weights-sum-to-one check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Fragments below this hourly size are merged away to prevent
/// micro-purchases.
pub const DEFAULT_MIN_FRAGMENT_HOURLY: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixEntry {
    pub term: Term,
    pub payment_option: PaymentOption,
    pub weight: f64,
}

/// Weighting across (term, payment option) pairs within one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortfolioMix {
    entries: Vec<MixEntry>,
}

#[derive(Debug, Error, PartialEq)]
pub enum MixError {
    #[error("portfolio mix is empty")]
    Empty,

    #[error("weight {weight} for {term}/{payment_option} is outside [0, 1]")]
    WeightOutOfRange {
        term: Term,
        payment_option: PaymentOption,
        weight: f64,
    },

    #[error("duplicate entry for {term}/{payment_option}")]
    DuplicatePair {
        term: Term,
        payment_option: PaymentOption,
    },

    #[error("{term}/{payment_option} is not purchasable for {category}")]
    DisallowedPair {
        category: SpCategory,
        term: Term,
        payment_option: PaymentOption,
    },

    #[error("weights sum to {sum}, expected 1.0")]
    WeightSum { sum: f64 },
}

impl PortfolioMix {
    pub fn new(entries: Vec<MixEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[MixEntry] {
        &self.entries
    }

    fn sorted_entries(&self) -> Vec<MixEntry> {
        let mut out = self.entries.clone();
        out.sort_by_key(|e| (e.term, e.payment_option));
        out
    }

    /// The highest-weighted pair, ties resolved by (term, payment) order.
    pub fn primary_pair(&self) -> Option<(Term, PaymentOption)> {
        self.sorted_entries()
            .into_iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.weight
                    .partial_cmp(&b.weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ib.cmp(ia))
            })
            .map(|(_, e)| (e.term, e.payment_option))
    }

    /// Rejects mixes with out-of-range weights, duplicate pairs, pairs the
    /// category cannot purchase, or weights not summing to 1.0 within
    /// [`WEIGHT_SUM_TOLERANCE`].
    pub fn validate_for(&self, category: SpCategory) -> Result<(), MixError> {
        if self.entries.is_empty() {
            return Err(MixError::Empty);
        }

        let mut seen = Vec::with_capacity(self.entries.len());
        let mut sum = 0.0;

        for entry in &self.entries {
            if !entry.weight.is_finite() || !(0.0..=1.0).contains(&entry.weight) {
                return Err(MixError::WeightOutOfRange {
                    term: entry.term,
                    payment_option: entry.payment_option,
                    weight: entry.weight,
                });
            }

            let pair = (entry.term, entry.payment_option);
            if seen.contains(&pair) {
                return Err(MixError::DuplicatePair {
                    term: entry.term,
                    payment_option: entry.payment_option,
                });
            }
            seen.push(pair);

            if !category.allows(entry.term, entry.payment_option) {
                return Err(MixError::DisallowedPair {
                    category,
                    term: entry.term,
                    payment_option: entry.payment_option,
                });
            }

            sum += entry.weight;
        }

        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MixError::WeightSum { sum });
        }

        Ok(())
    }
}

/// One split part, still missing the idempotency token and audit fields
/// the scheduler stamps on.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub term: Term,
    pub payment_option: PaymentOption,
    pub hourly_commitment: f64,
}

/// Splits `hourly_total` across the mix, preserving the total within
/// floating tolerance.
pub fn split(mix: &PortfolioMix, hourly_total: f64, min_fragment_hourly: f64) -> Vec<Fragment> {
    if !(hourly_total > 0.0) {
        return vec![];
    }

    let fragments: Vec<Fragment> = mix
        .sorted_entries()
        .into_iter()
        .filter(|e| e.weight > 0.0)
        .map(|e| Fragment {
            term: e.term,
            payment_option: e.payment_option,
            hourly_commitment: hourly_total * e.weight,
        })
        .collect();

    if fragments.is_empty() {
        return vec![];
    }

    let (mut kept, dust): (Vec<Fragment>, Vec<Fragment>) = fragments
        .into_iter()
        .partition(|f| f.hourly_commitment >= min_fragment_hourly);

    if kept.is_empty() {
        // Every part is dust: collapse the whole commitment into the
        // largest fragment's pair rather than dropping the purchase.
        let largest = dust
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.hourly_commitment
                    .partial_cmp(&b.hourly_commitment)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ib.cmp(ia))
            })
            .map(|(i, _)| i)
            .expect("dust is non-empty when kept is empty");

        let mut merged = dust[largest].clone();
        merged.hourly_commitment = hourly_total;
        return vec![merged];
    }

    let dust_total: f64 = dust.iter().map(|f| f.hourly_commitment).sum();
    if dust_total > 0.0 {
        debug!(
            dust_total,
            dust_fragments = dust.len(),
            "coalescing sub-minimum fragments into the largest"
        );
        let largest = kept
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.hourly_commitment
                    .partial_cmp(&b.hourly_commitment)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ib.cmp(ia))
            })
            .map(|(i, _)| i)
            .expect("kept is non-empty");
        kept[largest].hourly_commitment += dust_total;
    }

    kept
}
