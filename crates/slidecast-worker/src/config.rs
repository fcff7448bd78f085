//! Worker configuration.

use std::path::PathBuf;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent render jobs
    pub max_concurrent_jobs: usize,
    /// Kill a render that runs longer than this many seconds
    pub render_timeout_secs: u64,
    /// Directory artifacts are written to when the spec leaves the output
    /// path empty
    pub output_dir: PathBuf,
    /// Directory searched for overlay fonts by name
    pub fonts_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            render_timeout_secs: 600,
            output_dir: PathBuf::from("generated"),
            fonts_dir: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("SLIDECAST_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(2),
            render_timeout_secs: std::env::var("SLIDECAST_RENDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
            output_dir: std::env::var("SLIDECAST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("generated")),
            fonts_dir: std::env::var("SLIDECAST_FONTS_DIR").ok().map(PathBuf::from),
        }
    }
}
