//! Purchase executor.
//!
//! Drains one batch of intents from the review queue and executes them
//! against live coverage.
//!
//! Design principles:
//! - **Fail-closed**: an intent that does not validate, or whose
//!   projection breaches the cap, never reaches the purchase call.
//! - **Delete only after resolution**: messages are deleted on success
//!   and on deliberate skips; vendor failures leave the message for the
//!   visibility timeout to redeliver.
//! - **Monotonic baseline**: each success raises the in-memory coverage
//!   before the next intent is considered, so a batch cannot
//!   collectively overshoot the cap.
//!
//! An empty queue exits silently: no notification, no error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::cloud::types::CreateSavingsPlanRequest;
use crate::cloud::{ClientBundle, ClientFactory, CloudApi as _};
use crate::config::Config;
use crate::coverage::calculator::current_coverage;
use crate::error::AppError;
use crate::notify::publish_best_effort;
use crate::purchaser::types::{IntentResult, PurchaseReport};
use crate::queue::{QueueAdapter as _, QueueError, QueueMessage};
use crate::sp::types::{PurchaseIntent, PurchaseOutcome, SkipReason, SpCategory};
use crate::time::{Deadline, run_month};

pub struct Purchaser {
    config: Config,
}

impl Purchaser {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Executes one purchase run. Fatal errors are published as an error
    /// notification (when enabled) before they surface to the caller.
    pub async fn run(
        &self,
        factory: &dyn ClientFactory,
        now: DateTime<Utc>,
    ) -> Result<PurchaseReport, AppError> {
        match self.run_inner(factory, now).await {
            Ok(report) => Ok(report),
            Err(e) => {
                // Deadline expiry already published its partial summary.
                let already_notified = matches!(e, AppError::DeadlineExceeded { .. });
                if self.config.notify_on_error && !already_notified {
                    let notifier = factory.notifier();
                    publish_best_effort(
                        notifier.as_ref(),
                        "Savings Plans purchase run failed",
                        &e.to_string(),
                    )
                    .await;
                }
                Err(e)
            }
        }
    }

    #[instrument(skip_all, target = "purchaser")]
    async fn run_inner(
        &self,
        factory: &dyn ClientFactory,
        now: DateTime<Utc>,
    ) -> Result<PurchaseReport, AppError> {
        let deadline = Deadline::after(self.config.wall_clock_deadline());
        let bundle = ClientBundle::acquire(factory, self.config.assume_role_arn.as_deref()).await?;

        // The lease must outlive the run so a message is never
        // redelivered while it might still execute.
        let visibility = self.config.wall_clock_deadline() + std::time::Duration::from_secs(60);
        let messages = bundle
            .queue
            .receive_messages(self.config.purchase_batch_size, visibility)
            .await
            .map_err(QueueError::Receive)?;

        if messages.is_empty() {
            info!("queue empty; nothing to purchase");
            return Ok(PurchaseReport::default());
        }

        // Live coverage, not the snapshot the scheduler saw. If this
        // fails we cannot execute safely and the run aborts.
        let assessment = current_coverage(
            bundle.cloud.as_ref(),
            now,
            self.config.renewal_window_days,
            &SpCategory::ALL,
        )
        .await?;
        let mut live = assessment.snapshot;

        let mut results = Vec::with_capacity(messages.len());
        let mut deadline_hit = false;

        for message in messages {
            if deadline.expired() {
                warn!("wall-clock deadline reached; abandoning remaining intents");
                deadline_hit = true;
                break;
            }

            let intent = match parse_intent(&message) {
                Ok(intent) => intent,
                Err(reason) => {
                    warn!(reason = %reason, "discarding invalid queue message");
                    self.delete(&bundle, &message).await?;
                    results.push(IntentResult {
                        intent: None,
                        outcome: PurchaseOutcome::Skipped {
                            reason: SkipReason::InvalidIntent,
                        },
                    });
                    continue;
                }
            };

            let current = live.percent(intent.category);
            let projected = current + intent.projected_gain_pct;
            if projected > self.config.max_coverage_cap {
                info!(
                    category = %intent.category,
                    current,
                    projected,
                    cap = self.config.max_coverage_cap,
                    "skipping intent: projection breaches the cap"
                );
                self.delete(&bundle, &message).await?;
                results.push(IntentResult {
                    intent: Some(intent),
                    outcome: PurchaseOutcome::Skipped {
                        reason: SkipReason::CapExceeded,
                    },
                });
                continue;
            }

            let request = CreateSavingsPlanRequest {
                offering_id: intent.offering_id.clone(),
                hourly_commitment: intent.hourly_commitment,
                idempotency_token: intent.idempotency_token.clone(),
                tags: provenance_tags(&intent),
            };

            let purchase = tokio::time::timeout(
                self.config.api_timeout(),
                bundle.cloud.create_savings_plan(request),
            )
            .await;

            match purchase {
                Err(_) => {
                    warn!(
                        category = %intent.category,
                        "purchase call timed out; leaving message for retry"
                    );
                    results.push(IntentResult {
                        intent: Some(intent),
                        outcome: PurchaseOutcome::Failed {
                            code: "Timeout".into(),
                        },
                    });
                }
                Ok(Err(e)) => {
                    let code = classify_vendor_error(&e);
                    warn!(
                        category = %intent.category,
                        code = %code,
                        "purchase rejected; leaving message for retry"
                    );
                    results.push(IntentResult {
                        intent: Some(intent),
                        outcome: PurchaseOutcome::Failed { code },
                    });
                }
                Ok(Ok(created)) => {
                    self.delete(&bundle, &message).await?;
                    live.apply_gain(intent.category, intent.projected_gain_pct);
                    info!(
                        category = %intent.category,
                        plan_id = %created.plan_id,
                        hourly = intent.hourly_commitment,
                        coverage = live.percent(intent.category),
                        "savings plan purchased"
                    );
                    results.push(IntentResult {
                        intent: Some(intent),
                        outcome: PurchaseOutcome::Success {
                            plan_id: created.plan_id,
                        },
                    });
                }
            }
        }

        let report = PurchaseReport {
            results,
            coverage_after: live,
            deadline_hit,
        };

        let subject = if deadline_hit {
            "Savings Plans purchase results (partial: deadline hit)"
        } else {
            "Savings Plans purchase results"
        };
        publish_best_effort(bundle.notifier.as_ref(), subject, &report.summary_text()).await;

        if deadline_hit {
            return Err(AppError::DeadlineExceeded {
                budget_secs: deadline.budget_secs(),
            });
        }

        info!(
            successes = report.successes(),
            skips = report.skips(),
            failures = report.failures(),
            "purchase run complete"
        );

        Ok(report)
    }

    async fn delete(&self, bundle: &ClientBundle, message: &QueueMessage) -> Result<(), AppError> {
        bundle
            .queue
            .delete_message(&message.receipt)
            .await
            .map_err(|e| AppError::Queue(QueueError::Delete(e)))
    }
}

fn parse_intent(message: &QueueMessage) -> Result<PurchaseIntent, String> {
    let intent: PurchaseIntent =
        serde_json::from_str(&message.body).map_err(|e| e.to_string())?;
    intent.validate().map_err(|e| e.to_string())?;
    Ok(intent)
}

fn provenance_tags(intent: &PurchaseIntent) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("managed-by".to_string(), "savings-engine".to_string()),
        (
            "source-recommendation".to_string(),
            intent.source_recommendation_id.clone(),
        ),
        (
            "scheduled-month".to_string(),
            run_month(intent.created_at),
        ),
    ])
}

/// Normalizes vendor errors into stable bounded codes; anything unknown
/// is truncated so notifications never carry unbounded payloads.
fn classify_vendor_error(e: &anyhow::Error) -> String {
    let s = e.to_string();
    for known in [
        "ThrottlingException",
        "ServiceQuotaExceeded",
        "AccessDenied",
        "ValidationException",
    ] {
        if s.contains(known) {
            return known.into();
        }
    }

    const MAX: usize = 160;
    if s.len() > MAX {
        format!("ERR:{}", &s[..MAX])
    } else {
        s
    }
}
