//! In-memory queue adapter.
//!
//! Models the durable queue's contract closely enough to drive the
//! bootstrap binary and the test suite: per-message visibility timeout,
//! receipts that rotate on every delivery, purge, and a dead-letter
//! destination fed by a receive-count threshold.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::queue::{QueueAdapter, QueueMessage};

/// Deliveries after which a message is routed to the dead-letter store
/// instead of being redelivered.
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

#[derive(Debug, Clone)]
struct StoredMessage {
    id: Uuid,
    body: String,
    dedup_id: String,
    visible_at: Instant,
    receive_count: u32,
    receipt: Option<String>,
}

#[derive(Default)]
struct QueueState {
    messages: Vec<StoredMessage>,
    dead_letters: Vec<String>,
}

pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    max_receive_count: u32,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_max_receive_count(DEFAULT_MAX_RECEIVE_COUNT)
    }

    pub fn with_max_receive_count(max_receive_count: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            max_receive_count: max_receive_count.max(1),
        }
    }

    /// All stored messages, including currently invisible ones.
    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dead_letter_count(&self) -> usize {
        self.state.lock().dead_letters.len()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueAdapter for InMemoryQueue {
    async fn send_message(&self, body: String, dedup_id: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.messages.push(StoredMessage {
            id: Uuid::new_v4(),
            body,
            dedup_id: dedup_id.to_string(),
            visible_at: Instant::now(),
            receive_count: 0,
            receipt: None,
        });
        Ok(())
    }

    async fn receive_messages(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> anyhow::Result<Vec<QueueMessage>> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let max_receive_count = self.max_receive_count;

        let mut delivered = Vec::new();
        let mut dead = Vec::new();

        for (idx, message) in state.messages.iter_mut().enumerate() {
            if delivered.len() >= max_messages {
                break;
            }
            if message.visible_at > now {
                continue;
            }

            if message.receive_count >= max_receive_count {
                dead.push(idx);
                continue;
            }

            message.receive_count += 1;
            message.visible_at = now + visibility_timeout;
            let receipt = Uuid::new_v4().to_string();
            message.receipt = Some(receipt.clone());

            delivered.push(QueueMessage {
                body: message.body.clone(),
                receipt,
            });
        }

        // Drain exhausted messages to the dead-letter store, back to
        // front so indices stay valid.
        for idx in dead.into_iter().rev() {
            let message = state.messages.remove(idx);
            debug!(
                message_id = %message.id,
                dedup_id = %message.dedup_id,
                receives = message.receive_count,
                "message exhausted its receives; moving to dead letters"
            );
            state.dead_letters.push(message.body);
        }

        Ok(delivered)
    }

    async fn delete_message(&self, receipt: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let before = state.messages.len();
        state
            .messages
            .retain(|m| m.receipt.as_deref() != Some(receipt));

        if state.messages.len() == before {
            anyhow::bail!("unknown or expired receipt");
        }
        Ok(())
    }

    async fn purge(&self) -> anyhow::Result<()> {
        self.state.lock().messages.clear();
        Ok(())
    }
}
