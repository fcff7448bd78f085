//! In-process job queue and progress routing.
//!
//! This crate provides:
//! - A bounded-concurrency render queue: FIFO start order, at most K jobs
//!   running, failures isolated per job
//! - A session-keyed progress router with best-effort delivery

pub mod error;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use progress::{ProgressRouter, DEFAULT_EVENT_BUFFER};
pub use queue::{JobHandler, QueueConfig, RenderQueue};
