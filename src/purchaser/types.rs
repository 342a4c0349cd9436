use std::fmt::Write as _;

use crate::coverage::types::CoverageSnapshot;
use crate::sp::types::{PurchaseIntent, PurchaseOutcome, SkipReason};

/// One processed queue message.
///
/// `intent` is `None` when the message did not parse into a valid
/// intent; the outcome is then always `Skipped(InvalidIntent)`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentResult {
    pub intent: Option<PurchaseIntent>,
    pub outcome: PurchaseOutcome,
}

/// Aggregated outcome of one purchaser run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PurchaseReport {
    pub results: Vec<IntentResult>,
    pub coverage_after: CoverageSnapshot,
    pub deadline_hit: bool,
}

impl PurchaseReport {
    pub fn successes(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, PurchaseOutcome::Success { .. }))
            .count()
    }

    pub fn skips(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, PurchaseOutcome::Skipped { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, PurchaseOutcome::Failed { .. }))
            .count()
    }

    pub fn summary_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "{} succeeded, {} skipped, {} failed",
            self.successes(),
            self.skips(),
            self.failures(),
        );
        if self.deadline_hit {
            let _ = writeln!(out, "Run hit its deadline; remaining intents were left queued.");
        }

        for r in &self.results {
            let label = match &r.intent {
                Some(intent) => format!(
                    "{} {} / {} {:.4}/h",
                    intent.category, intent.term, intent.payment_option, intent.hourly_commitment,
                ),
                None => "unparseable message".to_string(),
            };
            let _ = match &r.outcome {
                PurchaseOutcome::Success { plan_id } => {
                    writeln!(out, "- {label}: purchased ({plan_id})")
                }
                PurchaseOutcome::Skipped { reason } => {
                    writeln!(out, "- {label}: skipped ({})", skip_label(*reason))
                }
                PurchaseOutcome::Failed { code } => writeln!(out, "- {label}: failed ({code})"),
            };
        }

        let _ = writeln!(out, "Coverage after run:");
        for (category, pct) in self.coverage_after.iter() {
            let _ = writeln!(out, "- {category}: {pct:.2}%");
        }

        out
    }
}

fn skip_label(reason: SkipReason) -> &'static str {
    reason.as_str()
}
