use serde::{Deserialize, Serialize};

use crate::portfolio::PortfolioMix;
use crate::sp::types::{PaymentOption, SpCategory, Term};

/// Vendor purchase suggestion for one category.
///
/// Absence of a recommendation is a valid answer and means "no action
/// suggested".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: SpCategory,

    /// Suggested hourly commitment. >= 0.
    pub hourly_commitment: f64,

    /// Opaque vendor identifier, kept for audit.
    pub recommendation_id: String,

    /// Offering the suggestion prices against; carried into intents so
    /// the purchase call can reference it.
    pub offering_id: String,
}

/// Parameters of one recommendation call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationQuery {
    pub category: SpCategory,
    pub term: Term,
    pub payment_option: PaymentOption,
    pub lookback_days: u32,
    pub min_data_days: u32,
}

impl RecommendationQuery {
    /// Builds the query for a category, requesting the configured
    /// portfolio's dominant (term, payment) pair.
    ///
    /// Category constraints override the configuration: a pair the
    /// category cannot purchase is replaced by the category's first
    /// allowed pair (for database that forces 1-year / no-upfront).
    pub fn for_category(
        category: SpCategory,
        mix: &PortfolioMix,
        lookback_days: u32,
        min_data_days: u32,
    ) -> Self {
        let (term, payment_option) = mix
            .primary_pair()
            .filter(|&(term, payment)| category.allows(term, payment))
            .unwrap_or(category.allowed_pairs()[0]);

        Self {
            category,
            term,
            payment_option,
            lookback_days,
            min_data_days,
        }
    }
}
