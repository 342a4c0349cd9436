//! Shared fixtures for the end-to-end tests: a scriptable cloud mock, a
//! recording notifier and a client factory wiring them to the in-memory
//! queue.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use savings_engine::cloud::types::{
    ActivePlan, CoverageReport, CreateSavingsPlanRequest, CreatedPlan, Credentials, TimeRange,
};
use savings_engine::cloud::{ClientFactory, CloudApi};
use savings_engine::config::{Config, PlanConfig};
use savings_engine::notify::NotificationSink;
use savings_engine::portfolio::{MixEntry, PortfolioMix};
use savings_engine::queue::{QueueAdapter, QueueMode, memory::InMemoryQueue};
use savings_engine::recommend::types::{Recommendation, RecommendationQuery};
use savings_engine::sp::types::{PaymentOption, PurchaseIntent, SpCategory, Term};
use savings_engine::strategy::Strategy;

#[derive(Default)]
pub struct MockCloud {
    percent: Mutex<BTreeMap<SpCategory, f64>>,
    denominator: Mutex<BTreeMap<SpCategory, f64>>,
    plans: Mutex<Vec<ActivePlan>>,
    recommendations: Mutex<BTreeMap<SpCategory, Recommendation>>,

    pub fail_coverage: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_assume: AtomicBool,

    create_calls: Mutex<Vec<CreateSavingsPlanRequest>>,
    plans_by_token: Mutex<HashMap<String, String>>,
    next_plan: AtomicUsize,
    assumed_roles: Mutex<Vec<String>>,
}

impl MockCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_coverage(&self, category: SpCategory, percent: f64, denominator: f64) {
        self.percent.lock().insert(category, percent);
        self.denominator.lock().insert(category, denominator);
    }

    pub fn set_recommendation(&self, recommendation: Recommendation) {
        self.recommendations
            .lock()
            .insert(recommendation.category, recommendation);
    }

    pub fn add_plan(&self, plan: ActivePlan) {
        self.plans.lock().push(plan);
    }

    /// Every purchase attempt, including vendor-coalesced retries.
    pub fn create_calls(&self) -> Vec<CreateSavingsPlanRequest> {
        self.create_calls.lock().clone()
    }

    /// Plans actually created (idempotency-token-distinct).
    pub fn distinct_plans(&self) -> usize {
        self.plans_by_token.lock().len()
    }

    pub fn assumed_roles(&self) -> Vec<String> {
        self.assumed_roles.lock().clone()
    }
}

#[async_trait]
impl CloudApi for MockCloud {
    async fn savings_plans_coverage(&self, _range: TimeRange) -> anyhow::Result<CoverageReport> {
        if self.fail_coverage.load(Ordering::SeqCst) {
            anyhow::bail!("ServiceUnavailable");
        }
        Ok(CoverageReport::new(
            self.percent.lock().clone(),
            self.denominator.lock().clone(),
        ))
    }

    async fn purchase_recommendation(
        &self,
        query: RecommendationQuery,
    ) -> anyhow::Result<Option<Recommendation>> {
        Ok(self.recommendations.lock().get(&query.category).cloned())
    }

    async fn describe_savings_plans(&self, _active_only: bool) -> anyhow::Result<Vec<ActivePlan>> {
        Ok(self.plans.lock().clone())
    }

    async fn create_savings_plan(
        &self,
        request: CreateSavingsPlanRequest,
    ) -> anyhow::Result<CreatedPlan> {
        self.create_calls.lock().push(request.clone());

        if self.fail_create.load(Ordering::SeqCst) {
            anyhow::bail!("ThrottlingException");
        }

        // Vendor-side dedup: a known token returns the existing plan.
        let mut by_token = self.plans_by_token.lock();
        let plan_id = by_token
            .entry(request.idempotency_token)
            .or_insert_with(|| {
                let n = self.next_plan.fetch_add(1, Ordering::SeqCst) + 1;
                format!("sp-{n}")
            })
            .clone();

        Ok(CreatedPlan { plan_id })
    }

    async fn assume_role(&self, role_arn: &str, _session_name: &str) -> anyhow::Result<Credentials> {
        if self.fail_assume.load(Ordering::SeqCst) {
            anyhow::bail!("AccessDenied");
        }
        self.assumed_roles.lock().push(role_arn.to_string());
        Ok(Credentials {
            access_key_id: "AKIATEST".into(),
            secret_access_key: "secret".into(),
            session_token: "session".into(),
            expires_at: None,
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.messages.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.messages.lock().iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn publish(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct TestFactory {
    pub cloud: Arc<MockCloud>,
    pub queue: Arc<InMemoryQueue>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestFactory {
    pub fn new() -> Self {
        Self {
            cloud: MockCloud::new(),
            queue: Arc::new(InMemoryQueue::new()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }
}

impl ClientFactory for TestFactory {
    fn cloud(&self, _credentials: Option<&Credentials>) -> Arc<dyn CloudApi> {
        self.cloud.clone()
    }

    fn queue(&self) -> Arc<dyn QueueAdapter> {
        self.queue.clone()
    }

    fn notifier(&self) -> Arc<dyn NotificationSink> {
        self.notifier.clone()
    }
}

/// Compute-only configuration with a single 1-year / no-upfront mix.
pub fn compute_config(strategy: Strategy) -> Config {
    Config {
        strategy,
        coverage_target_percent: 80.0,
        max_coverage_cap: 90.0,
        lookback_days: 30,
        min_data_days: 14,
        renewal_window_days: 30,
        sp_plans: BTreeMap::from([(
            SpCategory::Compute,
            PlanConfig {
                enabled: true,
                mix: PortfolioMix::new(vec![MixEntry {
                    term: Term::OneYear,
                    payment_option: PaymentOption::NoUpfront,
                    weight: 1.0,
                }]),
                partial_upfront_percent: None,
            },
        )]),
        dry_run: false,
        send_no_action: false,
        notify_on_error: true,
        queue_mode: QueueMode::Replace,
        assume_role_arn: None,
        purchase_batch_size: 10,
        wall_clock_deadline_seconds: 600,
        api_timeout_seconds: 30,
    }
}

pub fn compute_recommendation(hourly: f64) -> Recommendation {
    Recommendation {
        category: SpCategory::Compute,
        hourly_commitment: hourly,
        recommendation_id: "rec-compute".into(),
        offering_id: "off-compute".into(),
    }
}

/// A valid, already-stamped compute intent for purchaser tests.
pub fn compute_intent(hourly: f64, gain_pct: f64, token: &str) -> PurchaseIntent {
    PurchaseIntent {
        category: SpCategory::Compute,
        term: Term::OneYear,
        payment_option: PaymentOption::NoUpfront,
        hourly_commitment: hourly,
        upfront_fraction: 0.0,
        projected_gain_pct: gain_pct,
        offering_id: "off-compute".into(),
        source_recommendation_id: "rec-compute".into(),
        idempotency_token: token.into(),
        created_at: Utc::now(),
    }
}
