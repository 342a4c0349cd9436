//! Effective coverage computation.
//!
//! Raw coverage from the provider counts every active plan. For purchase
//! decisions, a plan ending inside the renewal window is treated as
//! already gone: its contribution is converted back to percentage points
//! (hourly commitment over the on-demand-equivalent hourly denominator)
//! and subtracted, floored at zero.
//!
//! A category with no coverage data, or with a missing/zero denominator,
//! reads as 0% covered. That is indistinguishable from a genuinely idle
//! workload, so the missing-denominator case is logged as its own
//! diagnostic while the decision behavior stays "do nothing".

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument, warn};

use crate::cloud::CloudApi;
use crate::cloud::types::{ActivePlan, TimeRange};
use crate::coverage::types::{CoverageAssessment, CoverageSnapshot};
use crate::error::AppError;
use crate::sp::types::SpCategory;

/// Usage window the raw coverage percent is read over.
const COVERAGE_LOOKBACK_DAYS: i64 = 30;

#[instrument(skip(cloud), fields(window_days = renewal_window_days))]
pub async fn current_coverage(
    cloud: &dyn CloudApi,
    at: DateTime<Utc>,
    renewal_window_days: u32,
    categories: &[SpCategory],
) -> Result<CoverageAssessment, AppError> {
    let range = TimeRange {
        start: at - Duration::days(COVERAGE_LOOKBACK_DAYS),
        end: at,
    };

    let report = cloud
        .savings_plans_coverage(range)
        .await
        .map_err(|cause| AppError::Fetch {
            scope: "coverage".into(),
            cause,
        })?;

    let plans = cloud
        .describe_savings_plans(true)
        .await
        .map_err(|cause| AppError::Fetch {
            scope: "active plans".into(),
            cause,
        })?;

    let mut snapshot = CoverageSnapshot::default();
    let mut denominators = BTreeMap::new();

    for &category in categories {
        let denominator = report
            .on_demand_equivalent_hourly(category)
            .filter(|d| d.is_finite() && *d > 0.0);

        let Some(denominator) = denominator else {
            warn!(
                category = %category,
                "on-demand denominator missing or zero; reporting coverage as 0"
            );
            snapshot.set_percent(category, 0.0);
            continue;
        };
        denominators.insert(category, denominator);

        let raw = report.percent(category).unwrap_or(0.0);

        let expiring_pct: f64 = plans
            .iter()
            .filter(|p| p.category == category && expires_within(p, at, renewal_window_days))
            .map(|p| p.hourly_commitment / denominator * 100.0)
            .sum();

        if expiring_pct > 0.0 {
            debug!(
                category = %category,
                raw_pct = raw,
                expiring_pct,
                "subtracting soon-to-expire plans from raw coverage"
            );
        }

        snapshot.set_percent(category, (raw - expiring_pct).max(0.0));
    }

    Ok(CoverageAssessment::new(snapshot, denominators))
}

fn expires_within(plan: &ActivePlan, at: DateTime<Utc>, window_days: u32) -> bool {
    plan.end_date.signed_duration_since(at) <= Duration::days(window_days as i64)
}
