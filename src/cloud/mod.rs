//! Adapter seam between the purchase pipeline and the cloud provider.
//!
//! The core never talks to vendor SDKs directly. It depends on the
//! [`CloudApi`] trait for cost, recommendation, plan and purchase calls,
//! and on a [`ClientFactory`] that binds concrete clients to a set of
//! credentials. [`ClientBundle::acquire`] is the single place where
//! cross-account role assumption happens.
//!
//! Queue and notification clients always bind to the ambient identity:
//! they live in the local account even when purchases target a delegated
//! account.

pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::notify::NotificationSink;
use crate::queue::QueueAdapter;
use crate::recommend::types::{Recommendation, RecommendationQuery};
use types::{
    ActivePlan, CoverageReport, CreateSavingsPlanRequest, CreatedPlan, Credentials, TimeRange,
};

/// Narrow view of the provider APIs the pipeline consumes.
///
/// Implementations must normalize vendor errors into stable messages;
/// orchestrators classify them into bounded codes before reporting.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn savings_plans_coverage(&self, range: TimeRange) -> anyhow::Result<CoverageReport>;

    async fn purchase_recommendation(
        &self,
        query: RecommendationQuery,
    ) -> anyhow::Result<Option<Recommendation>>;

    async fn describe_savings_plans(&self, active_only: bool) -> anyhow::Result<Vec<ActivePlan>>;

    async fn create_savings_plan(
        &self,
        request: CreateSavingsPlanRequest,
    ) -> anyhow::Result<CreatedPlan>;

    async fn assume_role(&self, role_arn: &str, session_name: &str)
    -> anyhow::Result<Credentials>;
}

/// Binds concrete adapter clients to an identity.
///
/// `cloud(None)` returns a client on the ambient identity; `cloud(Some(..))`
/// returns one bound to assumed credentials. Queue and notifier have no
/// credential parameter on purpose.
pub trait ClientFactory: Send + Sync {
    fn cloud(&self, credentials: Option<&Credentials>) -> Arc<dyn CloudApi>;
    fn queue(&self) -> Arc<dyn QueueAdapter>;
    fn notifier(&self) -> Arc<dyn NotificationSink>;
}

/// The clients one run works with, acquired once at run start and passed
/// by value through the call graph.
#[derive(Clone)]
pub struct ClientBundle {
    pub cloud: Arc<dyn CloudApi>,
    pub queue: Arc<dyn QueueAdapter>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl ClientBundle {
    /// Builds the bundle, assuming `assume_role_arn` first when set.
    ///
    /// Role denial is fatal: without the delegated identity no purchase
    /// call can be made safely.
    pub async fn acquire(
        factory: &dyn ClientFactory,
        assume_role_arn: Option<&str>,
    ) -> Result<Self, AppError> {
        let cloud = match assume_role_arn {
            None => factory.cloud(None),
            Some(role_arn) => {
                let ambient = factory.cloud(None);
                let session_name = format!("savings-engine-{}", Uuid::new_v4());
                let credentials = ambient
                    .assume_role(role_arn, &session_name)
                    .await
                    .map_err(|cause| AppError::AssumeRole {
                        role_arn: role_arn.to_string(),
                        cause,
                    })?;
                info!(role_arn, "assumed delegated role");
                factory.cloud(Some(&credentials))
            }
        };

        Ok(Self {
            cloud,
            queue: factory.queue(),
            notifier: factory.notifier(),
        })
    }
}
