//! Durable purchase-intent queue protocol.
//!
//! The queue is the only shared state between scheduler and purchaser
//! runs. The scheduler writes (optionally purging first), the purchaser
//! reads and deletes; deletions happen only after an intent has been
//! executed or deliberately skipped, so cancellation mid-run leaves the
//! queue consistent.

pub mod memory;
pub mod token;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::sp::types::PurchaseIntent;

/// How the scheduler publishes a new decision run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Purge pending intents first; each run supersedes the previous.
    Replace,
    /// Keep prior intents that are still under review.
    Append,
}

/// A received message plus the receipt needed to delete it.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub body: String,
    pub receipt: String,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to encode intent for the queue: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("queue purge failed: {0}")]
    Purge(anyhow::Error),

    #[error("queue send failed: {0}")]
    Send(anyhow::Error),

    #[error("queue receive failed: {0}")]
    Receive(anyhow::Error),

    #[error("queue delete failed: {0}")]
    Delete(anyhow::Error),
}

/// Transport abstraction over the durable queue.
///
/// Implementations must keep messages for at least the review window and
/// route repeatedly failing messages to a dead-letter destination.
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    async fn send_message(&self, body: String, dedup_id: &str) -> anyhow::Result<()>;

    async fn receive_messages(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> anyhow::Result<Vec<QueueMessage>>;

    async fn delete_message(&self, receipt: &str) -> anyhow::Result<()>;

    async fn purge(&self) -> anyhow::Result<()>;
}

/// Publishes a decision run to the queue. Returns the number of intents
/// enqueued.
///
/// Message bodies are the JSON form of [`PurchaseIntent`]; the
/// idempotency token doubles as the transport-level dedup id.
pub async fn enqueue_all(
    queue: &dyn QueueAdapter,
    intents: &[PurchaseIntent],
    mode: QueueMode,
) -> Result<usize, QueueError> {
    if mode == QueueMode::Replace {
        debug!("purging queue before enqueue");
        queue.purge().await.map_err(QueueError::Purge)?;
    }

    for intent in intents {
        let body = serde_json::to_string(intent)?;
        queue
            .send_message(body, &intent.idempotency_token)
            .await
            .map_err(QueueError::Send)?;
    }

    info!(count = intents.len(), mode = ?mode, "intents enqueued");
    Ok(intents.len())
}
