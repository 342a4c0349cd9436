use std::collections::BTreeMap;

use crate::sp::types::SpCategory;

/// Per-category effective coverage, in percent.
///
/// Percents are always finite and clipped to [0, 100]; a category the
/// provider reported nothing for reads as 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageSnapshot {
    percent_by_category: BTreeMap<SpCategory, f64>,
}

impl CoverageSnapshot {
    pub fn percent(&self, category: SpCategory) -> f64 {
        self.percent_by_category
            .get(&category)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_percent(&mut self, category: SpCategory, percent: f64) {
        self.percent_by_category
            .insert(category, clip_percent(percent));
    }

    /// Raises the in-memory baseline after a successful purchase so the
    /// next decision in the same run sees the new coverage.
    pub fn apply_gain(&mut self, category: SpCategory, gain_pct: f64) {
        let current = self.percent(category);
        self.set_percent(category, current + gain_pct);
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpCategory, f64)> + '_ {
        self.percent_by_category.iter().map(|(c, p)| (*c, *p))
    }
}

fn clip_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Coverage snapshot plus the on-demand-equivalent hourly denominators it
/// was derived from. The scheduler needs the denominators to convert an
/// hourly commitment into percentage points; the purchaser only reads
/// the snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageAssessment {
    pub snapshot: CoverageSnapshot,
    on_demand_hourly: BTreeMap<SpCategory, f64>,
}

impl CoverageAssessment {
    pub fn new(snapshot: CoverageSnapshot, on_demand_hourly: BTreeMap<SpCategory, f64>) -> Self {
        Self {
            snapshot,
            on_demand_hourly,
        }
    }

    /// Denominator for converting hourly commitments to percentage
    /// points. `None` means the provider had no usage data and no
    /// purchase decision may be made for the category.
    pub fn denominator(&self, category: SpCategory) -> Option<f64> {
        self.on_demand_hourly.get(&category).copied()
    }

    pub fn gain_pct(&self, category: SpCategory, hourly_commitment: f64) -> Option<f64> {
        self.denominator(category)
            .map(|denom| hourly_commitment / denom * 100.0)
    }
}
