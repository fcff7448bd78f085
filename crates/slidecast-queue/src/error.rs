//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("submit failed: {0}")]
    SubmitFailed(String),

    #[error("queue is shutting down")]
    ShuttingDown,
}

impl QueueError {
    pub fn submit_failed(msg: impl Into<String>) -> Self {
        Self::SubmitFailed(msg.into())
    }
}
