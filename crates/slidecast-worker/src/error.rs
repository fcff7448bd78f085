//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("script generation failed: {0}")]
    ScriptGeneration(String),

    #[error("media error: {0}")]
    Media(#[from] slidecast_media::MediaError),

    #[error("queue error: {0}")]
    Queue(#[from] slidecast_queue::QueueError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn script_generation(msg: impl Into<String>) -> Self {
        Self::ScriptGeneration(msg.into())
    }
}
