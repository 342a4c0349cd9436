//! Notification boundary.
//!
//! The pipeline publishes plain-text summaries through a narrow sink
//! trait; templates and transport live outside the core. Publish
//! failures are logged and never mask the error or result that was
//! being reported.

pub mod log;
pub mod webhook;

use async_trait::async_trait;
use tracing::error;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Publishes and swallows failures. The only place notification errors
/// are handled; callers keep their own result untouched.
pub async fn publish_best_effort(sink: &dyn NotificationSink, subject: &str, body: &str) {
    if let Err(e) = sink.publish(subject, body).await {
        error!(error = %e, subject, "notification publish failed");
    }
}
