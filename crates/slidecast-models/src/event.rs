//! Status event envelopes pushed to the requesting session.
//!
//! The wire shape matches what the browser client consumes:
//! `{ jobId, status, progress, message?, outputPath? }`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobStatus};

/// One progress/status update for a job.
///
/// Delivery is best-effort: events for sessions without a live connection
/// are dropped, never buffered.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusEvent {
    /// Job this event belongs to
    #[serde(rename = "jobId")]
    pub job_id: JobId,

    /// Lifecycle state at the time of the event
    pub status: JobStatus,

    /// Progress percentage (0-100); 100 only together with `done`
    pub progress: u8,

    /// Short human-readable note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Artifact location, present only on `done`
    #[serde(rename = "outputPath", skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    /// When the event was produced
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    fn new(job_id: JobId, status: JobStatus, progress: u8) -> Self {
        Self {
            job_id,
            status,
            progress,
            message: None,
            output_path: None,
            timestamp: Utc::now(),
        }
    }

    /// Job accepted into the queue.
    pub fn queued(job_id: JobId) -> Self {
        Self::new(job_id, JobStatus::Queued, 0)
    }

    /// Job claimed a slot.
    pub fn starting(job_id: JobId) -> Self {
        Self::new(job_id, JobStatus::Starting, 0)
    }

    /// Waiting on the script-generation service.
    pub fn generating_script(job_id: JobId) -> Self {
        let mut event = Self::new(job_id, JobStatus::GeneratingScript, 2);
        event.message = Some("Generating narration script...".to_string());
        event
    }

    /// Encoder progress; `progress` is capped below 100 by the producer.
    pub fn rendering(job_id: JobId, progress: u8) -> Self {
        let progress = progress.min(99);
        let mut event = Self::new(job_id, JobStatus::Rendering, progress);
        event.message = Some(format!("Rendering... {progress}%"));
        event
    }

    /// Terminal success with the artifact path.
    pub fn done(job_id: JobId, output_path: impl Into<String>) -> Self {
        let mut event = Self::new(job_id, JobStatus::Done, 100);
        event.message = Some("Finished".to_string());
        event.output_path = Some(output_path.into());
        event
    }

    /// Terminal failure with a human-readable reason.
    pub fn error(job_id: JobId, message: impl Into<String>) -> Self {
        let mut event = Self::new(job_id, JobStatus::Error, 0);
        event.message = Some(message.into());
        event
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = StatusEvent::done(JobId::from_string("job-1"), "/generated/job-1.mp4");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"jobId\":\"job-1\""));
        assert!(json.contains("\"status\":\"done\""));
        assert!(json.contains("\"progress\":100"));
        assert!(json.contains("\"outputPath\":\"/generated/job-1.mp4\""));
    }

    #[test]
    fn test_rendering_event_never_reports_completion() {
        let event = StatusEvent::rendering(JobId::new(), 100);
        assert_eq!(event.progress, 99);
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let event = StatusEvent::queued(JobId::from_string("job-2"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("outputPath"));
        assert!(!json.contains("message"));
    }

    #[test]
    fn test_only_done_carries_full_progress() {
        assert_eq!(StatusEvent::done(JobId::new(), "x.mp4").progress, 100);
        assert_eq!(StatusEvent::error(JobId::new(), "boom").progress, 0);
        assert!(StatusEvent::rendering(JobId::new(), 98).progress < 100);
    }
}
