use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use savings_engine::{
    cloud::{
        ClientFactory, CloudApi,
        types::{
            ActivePlan, CoverageReport, CreateSavingsPlanRequest, CreatedPlan, Credentials,
            TimeRange,
        },
    },
    config::Config,
    logger::{RunId, init_tracing, run_span},
    notify::{NotificationSink, log::LogNotifier, webhook::WebhookNotifier},
    purchaser::purchaser::Purchaser,
    queue::{QueueAdapter, memory::InMemoryQueue},
    recommend::types::{Recommendation, RecommendationQuery},
    scheduler::scheduler::Scheduler,
};
use tracing::Instrument;

/// Placeholder provider client for local bootstrap runs.
struct StubCloudApi;

#[async_trait]
impl CloudApi for StubCloudApi {
    // TODO: Replace with the SDK-backed client (Cost Explorer +
    // Savings Plans + STS). Normalize vendor error codes into the
    // strings classify_vendor_error() recognizes, e.g.
    // - throttled => Err(anyhow::anyhow!("ThrottlingException"))
    // - denied => Err(anyhow::anyhow!("AccessDenied"))
    async fn savings_plans_coverage(&self, _range: TimeRange) -> anyhow::Result<CoverageReport> {
        Ok(CoverageReport::default())
    }

    async fn purchase_recommendation(
        &self,
        _query: RecommendationQuery,
    ) -> anyhow::Result<Option<Recommendation>> {
        Ok(None)
    }

    async fn describe_savings_plans(&self, _active_only: bool) -> anyhow::Result<Vec<ActivePlan>> {
        Ok(vec![])
    }

    async fn create_savings_plan(
        &self,
        _request: CreateSavingsPlanRequest,
    ) -> anyhow::Result<CreatedPlan> {
        anyhow::bail!("stub client cannot purchase; wire the SDK-backed client first")
    }

    async fn assume_role(&self, _role_arn: &str, _session_name: &str) -> anyhow::Result<Credentials> {
        anyhow::bail!("stub client cannot assume roles; wire the SDK-backed client first")
    }
}

struct LocalClientFactory {
    cloud: Arc<StubCloudApi>,
    queue: Arc<InMemoryQueue>,
    notifier: Arc<dyn NotificationSink>,
}

impl ClientFactory for LocalClientFactory {
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

fn notifier_from_env() -> anyhow::Result<Arc<dyn NotificationSink>> {
    match std::env::var("WEBHOOK_URL") {
        Ok(url) => Ok(Arc::new(WebhookNotifier::new(url)?)),
        Err(_) => Ok(Arc::new(LogNotifier)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    let mode = std::env::args().nth(1).unwrap_or_default();
    let config_path = std::env::var("SAVINGS_ENGINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("savings-engine.json"));

    let config = Config::from_json_file(&config_path)?;

    let factory = LocalClientFactory {
        cloud: Arc::new(StubCloudApi),
        queue: Arc::new(InMemoryQueue::new()),
        notifier: notifier_from_env()?,
    };

    let run_id = RunId::new();
    let span = run_span("savings-engine", &run_id);

    match mode.as_str() {
        "schedule" => {
            let report = Scheduler::new(config)
                .run(&factory, Utc::now())
                .instrument(span)
                .await?;
            tracing::info!(
                queued = report.intents.len(),
                dry_run = report.dry_run,
                "scheduling finished"
            );
        }
        "purchase" => {
            let report = Purchaser::new(config)
                .run(&factory, Utc::now())
                .instrument(span)
                .await?;
            tracing::info!(
                successes = report.successes(),
                skips = report.skips(),
                failures = report.failures(),
                "purchasing finished"
            );
        }
        other => {
            anyhow::bail!("usage: savings-engine <schedule|purchase> (got {other:?})");
        }
    }

    Ok(())
}
