use std::fmt::Write as _;

use crate::sp::types::{PurchaseIntent, SpCategory};

/// Why a category did or did not produce intents in a scheduling run.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionAction {
    /// The vendor suggested nothing for this category.
    NoRecommendation,
    /// No on-demand usage denominator; gains cannot be computed.
    NoDenominator,
    /// The strategy elected to buy nothing.
    NothingToBuy,
    /// The coverage cap left no headroom for a purchase.
    CapReached,
    Queued {
        hourly_commitment: f64,
        gain_pct: f64,
        fragments: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDecision {
    pub category: SpCategory,
    pub current_pct: f64,
    pub action: DecisionAction,
}

/// Outcome of one scheduling run.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerReport {
    pub intents: Vec<PurchaseIntent>,
    pub enqueued: usize,
    pub dry_run: bool,
    pub decisions: Vec<CategoryDecision>,
}

impl SchedulerReport {
    pub fn total_hourly(&self) -> f64 {
        self.intents.iter().map(|i| i.hourly_commitment).sum()
    }

    pub fn summary_text(&self) -> String {
        let mut out = String::new();

        if self.dry_run {
            let _ = writeln!(out, "Dry run: nothing was enqueued.");
        }

        for d in &self.decisions {
            let _ = write!(out, "{} (coverage {:.2}%): ", d.category, d.current_pct);
            let _ = match &d.action {
                DecisionAction::NoRecommendation => writeln!(out, "no vendor recommendation"),
                DecisionAction::NoDenominator => writeln!(out, "no usage data"),
                DecisionAction::NothingToBuy => writeln!(out, "nothing to buy"),
                DecisionAction::CapReached => writeln!(out, "coverage cap leaves no headroom"),
                DecisionAction::Queued {
                    hourly_commitment,
                    gain_pct,
                    fragments,
                } => writeln!(
                    out,
                    "{hourly_commitment:.4}/h across {fragments} intent(s), +{gain_pct:.2}pp projected",
                ),
            };
        }

        for intent in &self.intents {
            let _ = writeln!(
                out,
                "- {} {} / {}: {:.4}/h (+{:.2}pp)",
                intent.category,
                intent.term,
                intent.payment_option,
                intent.hourly_commitment,
                intent.projected_gain_pct,
            );
        }

        if self.intents.is_empty() {
            let _ = writeln!(out, "No purchases queued.");
        }

        out
    }
}
