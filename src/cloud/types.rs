use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::sp::types::SpCategory;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Raw coverage data as returned by the provider, keyed by category.
///
/// `on_demand_equivalent_hourly` is the denominator that converts an
/// hourly commitment into percentage points of coverage. A missing or
/// zero denominator means the provider has no usage data for that
/// category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageReport {
    percent: BTreeMap<SpCategory, f64>,
    on_demand_equivalent_hourly: BTreeMap<SpCategory, f64>,
}

impl CoverageReport {
    pub fn new(
        percent: BTreeMap<SpCategory, f64>,
        on_demand_equivalent_hourly: BTreeMap<SpCategory, f64>,
    ) -> Self {
        Self {
            percent,
            on_demand_equivalent_hourly,
        }
    }

    pub fn percent(&self, category: SpCategory) -> Option<f64> {
        self.percent.get(&category).copied()
    }

    pub fn on_demand_equivalent_hourly(&self, category: SpCategory) -> Option<f64> {
        self.on_demand_equivalent_hourly.get(&category).copied()
    }
}

/// An active plan as reported by the provider's describe call.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePlan {
    pub plan_id: String,
    pub category: SpCategory,
    pub end_date: DateTime<Utc>,
    pub hourly_commitment: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSavingsPlanRequest {
    pub offering_id: String,
    pub hourly_commitment: f64,
    /// Forwarded to the vendor so retried submissions coalesce.
    pub idempotency_token: String,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPlan {
    pub plan_id: String,
}

/// Temporary credentials from a role assumption.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}
