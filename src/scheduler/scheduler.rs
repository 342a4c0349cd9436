//! Scheduling orchestrator.
//!
//! Responsibilities:
//! - Gather coverage and vendor recommendations concurrently.
//! - Size a purchase per category through the configured strategy.
//! - Split each purchase across the portfolio mix and stamp idempotency
//!   tokens.
//! - Enqueue intents for review and notify.
//!
//! Non-responsibilities:
//! - Executing purchases (the purchaser drains the queue after the
//!   review window).
//! - Final cap enforcement (re-validated per intent at execution time;
//!   the clamp here only keeps obviously oversized intents out of the
//!   queue).
//!
//! A dry run is identical in every respect except that the queue is
//! never touched.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::cloud::{ClientBundle, ClientFactory};
use crate::config::Config;
use crate::coverage::calculator::current_coverage;
use crate::coverage::types::CoverageAssessment;
use crate::error::AppError;
use crate::logger::warn_if_slow;
use crate::notify::publish_best_effort;
use crate::portfolio::{self, DEFAULT_MIN_FRAGMENT_HOURLY};
use crate::queue::{enqueue_all, token::idempotency_token};
use crate::recommend::fetcher::fetch_recommendations;
use crate::recommend::types::{Recommendation, RecommendationQuery};
use crate::scheduler::types::{CategoryDecision, DecisionAction, SchedulerReport};
use crate::sp::types::{PurchaseIntent, SpCategory};
use crate::strategy::StrategyInput;
use crate::time::run_month;

const SLOW_GATHER: Duration = Duration::from_secs(10);

pub struct Scheduler {
    config: Config,
}

impl Scheduler {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Executes one decision run. Fatal errors are published as an error
    /// notification (when enabled) before they surface to the caller.
    pub async fn run(
        &self,
        factory: &dyn ClientFactory,
        now: DateTime<Utc>,
    ) -> Result<SchedulerReport, AppError> {
        match self.run_inner(factory, now).await {
            Ok(report) => Ok(report),
            Err(e) => {
                if self.config.notify_on_error {
                    let notifier = factory.notifier();
                    publish_best_effort(
                        notifier.as_ref(),
                        "Savings Plans scheduling run failed",
                        &e.to_string(),
                    )
                    .await;
                }
                Err(e)
            }
        }
    }

    #[instrument(skip_all, target = "scheduler", fields(dry_run = self.config.dry_run))]
    async fn run_inner(
        &self,
        factory: &dyn ClientFactory,
        now: DateTime<Utc>,
    ) -> Result<SchedulerReport, AppError> {
        let bundle = ClientBundle::acquire(factory, self.config.assume_role_arn.as_deref()).await?;
        let categories = self.config.enabled_categories();

        let queries: Vec<RecommendationQuery> = categories
            .iter()
            .map(|&category| {
                RecommendationQuery::for_category(
                    category,
                    &self.config.sp_plans[&category].mix,
                    self.config.lookback_days,
                    self.config.min_data_days,
                )
            })
            .collect();

        let (coverage, recommendations) = warn_if_slow("decision inputs", SLOW_GATHER, async {
            tokio::join!(
                current_coverage(
                    bundle.cloud.as_ref(),
                    now,
                    self.config.renewal_window_days,
                    &categories,
                ),
                fetch_recommendations(bundle.cloud.as_ref(), queries, self.config.api_timeout()),
            )
        })
        .await;

        // A failed coverage read degrades to "no usage data": every
        // category then lacks a denominator and nothing is queued.
        let coverage = match coverage {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(error = %e, "coverage fetch failed; continuing without usage data");
                CoverageAssessment::default()
            }
        };

        let mut intents = Vec::new();
        let mut decisions = Vec::new();
        let month = run_month(now);

        for &category in &categories {
            let current_pct = coverage.snapshot.percent(category);

            let recommendation = recommendations.get(&category).and_then(Clone::clone);
            let Some(recommendation) = recommendation else {
                debug!(category = %category, "no recommendation; skipping");
                decisions.push(CategoryDecision {
                    category,
                    current_pct,
                    action: DecisionAction::NoRecommendation,
                });
                continue;
            };

            let Some(denominator) = coverage.denominator(category) else {
                info!(
                    category = %category,
                    "usage denominator unavailable; not purchasing"
                );
                decisions.push(CategoryDecision {
                    category,
                    current_pct,
                    action: DecisionAction::NoDenominator,
                });
                continue;
            };

            let action = self.decide_category(
                category,
                current_pct,
                denominator,
                &recommendation,
                &month,
                now,
                &mut intents,
            );
            decisions.push(CategoryDecision {
                category,
                current_pct,
                action,
            });
        }

        let enqueued = if self.config.dry_run {
            info!(intents = intents.len(), "dry run; queue untouched");
            0
        } else if intents.is_empty() {
            0
        } else {
            enqueue_all(bundle.queue.as_ref(), &intents, self.config.queue_mode).await?
        };

        let report = SchedulerReport {
            intents,
            enqueued,
            dry_run: self.config.dry_run,
            decisions,
        };

        if report.intents.is_empty() {
            if self.config.send_no_action {
                publish_best_effort(
                    bundle.notifier.as_ref(),
                    "Savings Plans: no action",
                    &report.summary_text(),
                )
                .await;
            }
        } else {
            let subject = if report.dry_run {
                "Savings Plans purchase schedule (dry run)"
            } else {
                "Savings Plans purchase schedule"
            };
            publish_best_effort(bundle.notifier.as_ref(), subject, &report.summary_text()).await;
        }

        info!(
            queued = report.intents.len(),
            total_hourly = report.total_hourly(),
            "scheduling run complete"
        );

        Ok(report)
    }

    /// Sizes, cap-clamps and splits one category's purchase, pushing the
    /// stamped intents. Returns the decision taken.
    #[allow(clippy::too_many_arguments)]
    fn decide_category(
        &self,
        category: SpCategory,
        current_pct: f64,
        denominator: f64,
        recommendation: &Recommendation,
        month: &str,
        now: DateTime<Utc>,
        intents: &mut Vec<PurchaseIntent>,
    ) -> DecisionAction {
        let full_gain_pct = recommendation.hourly_commitment / denominator * 100.0;

        let mut hourly = self.config.strategy.decide(&StrategyInput {
            current_pct,
            target_pct: self.config.coverage_target_percent,
            recommended_hourly: recommendation.hourly_commitment,
            full_gain_pct,
        });

        if hourly <= 0.0 {
            debug!(category = %category, "strategy elected not to buy");
            return DecisionAction::NothingToBuy;
        }

        let mut gain_pct = hourly / denominator * 100.0;

        // Keep the projection under the hard cap; the purchaser
        // re-validates against live coverage at execution time.
        if current_pct + gain_pct > self.config.max_coverage_cap {
            let headroom = self.config.max_coverage_cap - current_pct;
            if headroom <= 0.0 {
                info!(category = %category, current_pct, "cap already reached");
                return DecisionAction::CapReached;
            }
            let scale = headroom / gain_pct;
            hourly *= scale;
            gain_pct = headroom;
            debug!(
                category = %category,
                scaled_hourly = hourly,
                "clamped purchase to cap headroom"
            );
            if hourly <= 0.0 {
                return DecisionAction::CapReached;
            }
        }

        let fragments = portfolio::split(
            &self.config.sp_plans[&category].mix,
            hourly,
            DEFAULT_MIN_FRAGMENT_HOURLY,
        );
        let fragment_count = fragments.len();

        for fragment in fragments {
            let token = idempotency_token(
                category,
                fragment.term,
                fragment.payment_option,
                fragment.hourly_commitment,
                &recommendation.recommendation_id,
                month,
            );

            intents.push(PurchaseIntent {
                category,
                term: fragment.term,
                payment_option: fragment.payment_option,
                hourly_commitment: fragment.hourly_commitment,
                upfront_fraction: self
                    .config
                    .upfront_fraction(category, fragment.payment_option),
                projected_gain_pct: fragment.hourly_commitment / denominator * 100.0,
                offering_id: recommendation.offering_id.clone(),
                source_recommendation_id: recommendation.recommendation_id.clone(),
                idempotency_token: token,
                created_at: now,
            });
        }

        DecisionAction::Queued {
            hourly_commitment: hourly,
            gain_pct,
            fragments: fragment_count,
        }
    }
}
