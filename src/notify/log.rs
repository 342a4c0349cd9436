use async_trait::async_trait;
use tracing::info;

use crate::notify::NotificationSink;

/// Zero-configuration sink that writes notifications to the log stream.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn publish(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(target: "notifications", subject, body, "notification published");
        Ok(())
    }
}
