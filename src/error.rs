//! Run-level error taxonomy.
//!
//! Per-intent problems (invalid message, cap skip, vendor rejection) are
//! outcomes, not errors: the purchaser records them and continues the
//! batch. Everything here aborts the run that raised it, after a
//! best-effort error notification.

use thiserror::Error;

use crate::config::ConfigError;
use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to assume role {role_arn}: {cause}")]
    AssumeRole {
        role_arn: String,
        cause: anyhow::Error,
    },

    #[error("fetch failed ({scope}): {cause}")]
    Fetch {
        scope: String,
        cause: anyhow::Error,
    },

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("run deadline exceeded ({budget_secs}s budget)")]
    DeadlineExceeded { budget_secs: u64 },
}
