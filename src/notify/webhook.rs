use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::notify::NotificationSink;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

/// Posts notifications as JSON to a webhook endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn publish(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        self.http
            .post(&self.url)
            .json(&WebhookPayload { subject, body })
            .send()
            .await?
            .error_for_status()?;

        debug!(subject, "webhook notification delivered");
        Ok(())
    }
}
