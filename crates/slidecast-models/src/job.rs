//! Render jobs and the job status state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::spec::RenderSpec;

/// Unique identifier for a render job.
///
/// Artifact filenames are derived from this, so concurrent jobs can never
/// collide on the output path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity under which a render was requested; used only to route
/// progress events to the requester's live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a render job.
///
/// Transitions are one-directional:
/// `Queued -> Starting -> GeneratingScript -> Rendering -> Done | Error`.
/// `GeneratingScript` may be skipped when no script is needed, and `Error`
/// is reachable from any non-terminal state; `Done` only from `Rendering`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a free queue slot
    #[default]
    Queued,
    /// Claimed by a worker, not yet doing anything observable
    Starting,
    /// Waiting on the script-generation service
    GeneratingScript,
    /// The encoder subprocess is running
    Rendering,
    /// Finished; the artifact is at its final path
    Done,
    /// Failed; no artifact was left behind
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Starting => "starting",
            JobStatus::GeneratingScript => "generating_script",
            JobStatus::Rendering => "rendering",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Queued => false,
            JobStatus::Starting => matches!(self, JobStatus::Queued),
            JobStatus::GeneratingScript => matches!(self, JobStatus::Starting),
            JobStatus::Rendering => {
                matches!(self, JobStatus::Starting | JobStatus::GeneratingScript)
            }
            JobStatus::Done => matches!(self, JobStatus::Rendering),
            JobStatus::Error => true,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One render request with its identity and mutable progress state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    /// Unique job ID
    pub id: JobId,

    /// Owning session, for progress routing
    pub session: SessionId,

    /// What to render
    pub spec: RenderSpec,

    /// Current lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Progress percentage (0-100); non-decreasing, 100 only at `Done`
    #[serde(default)]
    pub progress: u8,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Artifact location (once done)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    /// Create a queued job for a session.
    pub fn new(session: SessionId, spec: RenderSpec) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            session,
            spec,
            status: JobStatus::Queued,
            progress: 0,
            error_message: None,
            output_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next` if the transition is legal; returns whether it was.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Record progress for a running job.
    ///
    /// Values below the current progress are ignored, and a running job is
    /// held below 100; only [`RenderJob::complete`] reaches 100.
    pub fn set_progress(&mut self, progress: u8) {
        let capped = progress.min(99);
        if capped > self.progress {
            self.progress = capped;
            self.updated_at = Utc::now();
        }
    }

    /// Mark the job done with its artifact path.
    pub fn complete(&mut self, output: impl Into<PathBuf>) {
        self.status = JobStatus::Done;
        self.progress = 100;
        self.output_path = Some(output.into());
        self.updated_at = Utc::now();
    }

    /// Mark the job failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Error;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
