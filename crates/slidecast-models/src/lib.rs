//! Shared data models for the Slidecast render pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Render specifications (slides, audio, overlay styling)
//! - Jobs and the job status state machine
//! - Status/progress event envelopes
//! - Encoding configuration

pub mod encoding;
pub mod event;
pub mod job;
pub mod spec;

// Re-export common types
pub use encoding::{EncodingConfig, FRAME_RATE};
pub use event::StatusEvent;
pub use job::{JobId, JobStatus, RenderJob, SessionId};
pub use spec::{RenderSpec, SizePreset, SpecError, TargetSize, TextPosition};
