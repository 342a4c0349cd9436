use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, Utc};

/// Calendar month a run belongs to, e.g. `"2026-08"`.
///
/// Part of the idempotency token input: two runs in the same month that
/// derive the same intent produce the same token.
pub fn run_month(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Wall-clock budget for a single run.
///
/// On expiry the run abandons in-flight work, notifies with partial
/// results and exits failed.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn budget_secs(&self) -> u64 {
        self.budget.as_secs()
    }
}
