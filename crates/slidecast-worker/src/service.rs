//! The render service: the surface the surrounding system talks to.
//!
//! `submit_render` is the only way in; progress comes back through the
//! session's registered endpoint on the [`ProgressRouter`]. Nothing about
//! a job outlives its terminal status here; durable bookkeeping belongs to
//! the caller.

use std::sync::Arc;

use slidecast_models::{EncodingConfig, JobId, RenderJob, RenderSpec, SessionId, StatusEvent};
use slidecast_queue::{ProgressRouter, QueueConfig, RenderQueue};
use tracing::info;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::render_job::{FfmpegRenderer, RenderJobRunner, VideoRenderer};
use crate::script::{GeminiScript, ScriptGenerator};

/// Owns the queue, the router, and the job runner wiring.
pub struct RenderService {
    config: WorkerConfig,
    queue: RenderQueue,
    router: Arc<ProgressRouter>,
}

impl RenderService {
    /// Start with the real FFmpeg renderer and, when `GEMINI_API_KEY` is
    /// set, the Gemini script generator.
    pub fn start(config: WorkerConfig) -> Self {
        let script: Option<Arc<dyn ScriptGenerator>> = match GeminiScript::from_env() {
            Ok(client) => Some(Arc::new(client) as Arc<dyn ScriptGenerator>),
            Err(_) => {
                info!("no script generator configured, overlays use caller-supplied text");
                None
            }
        };

        let renderer: Arc<dyn VideoRenderer> = Arc::new(FfmpegRenderer::new(
            EncodingConfig::default(),
            Some(config.render_timeout_secs),
        ));

        Self::with_components(config, script, renderer)
    }

    /// Wire the service from explicit components (tests use stubs here).
    pub fn with_components(
        config: WorkerConfig,
        script: Option<Arc<dyn ScriptGenerator>>,
        renderer: Arc<dyn VideoRenderer>,
    ) -> Self {
        let router = Arc::new(ProgressRouter::new());
        let runner = Arc::new(RenderJobRunner::new(
            Arc::clone(&router),
            script,
            renderer,
        ));
        let queue = RenderQueue::start(
            QueueConfig {
                max_concurrent_jobs: config.max_concurrent_jobs,
            },
            runner,
        );

        Self {
            config,
            queue,
            router,
        }
    }

    /// The progress router; transports register/deregister sessions here.
    pub fn router(&self) -> Arc<ProgressRouter> {
        Arc::clone(&self.router)
    }

    /// Enqueue a render for a session and return its job ID immediately.
    ///
    /// A spec with an empty output path gets one derived from the job ID
    /// under the configured output directory, so concurrent jobs can never
    /// collide on a filename.
    pub async fn submit_render(
        &self,
        session: &SessionId,
        spec: RenderSpec,
    ) -> WorkerResult<JobId> {
        let mut job = RenderJob::new(session.clone(), spec);

        if job.spec.output_path.as_os_str().is_empty() {
            tokio::fs::create_dir_all(&self.config.output_dir).await?;
            job.spec.output_path = self.config.output_dir.join(format!("{}.mp4", job.id));
        }

        let id = job.id.clone();
        self.router
            .route(session, StatusEvent::queued(id.clone()))
            .await;
        self.queue.submit(job)?;
        Ok(id)
    }

    /// Stop accepting jobs and drain what is queued or running.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }
}
