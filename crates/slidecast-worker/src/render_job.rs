//! The per-job render pipeline.
//!
//! One job walks `Starting -> GeneratingScript -> Rendering -> Done |
//! Error`, with every edge pushed to the owning session. The script step
//! is skipped when overlay text is already supplied, and a script-service
//! failure only costs the overlay, never the render.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use slidecast_media::{render_video, MediaResult};
use slidecast_models::{EncodingConfig, JobStatus, RenderJob, RenderSpec, StatusEvent};
use slidecast_queue::{JobHandler, ProgressRouter};

use crate::logging::JobLogger;
use crate::script::ScriptGenerator;

/// Renders a spec to its artifact, reporting percentages on the way.
///
/// Trait seam so the pipeline is testable without an encoder installed.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    async fn render(
        &self,
        spec: &RenderSpec,
        overlay_text: &str,
        progress: mpsc::UnboundedSender<u8>,
    ) -> MediaResult<PathBuf>;
}

/// The real renderer, backed by the FFmpeg executor.
pub struct FfmpegRenderer {
    encoding: EncodingConfig,
    timeout_secs: Option<u64>,
}

impl FfmpegRenderer {
    pub fn new(encoding: EncodingConfig, timeout_secs: Option<u64>) -> Self {
        Self {
            encoding,
            timeout_secs,
        }
    }
}

#[async_trait]
impl VideoRenderer for FfmpegRenderer {
    async fn render(
        &self,
        spec: &RenderSpec,
        overlay_text: &str,
        progress: mpsc::UnboundedSender<u8>,
    ) -> MediaResult<PathBuf> {
        render_video(spec, overlay_text, &self.encoding, self.timeout_secs, {
            move |pct| {
                let _ = progress.send(pct);
            }
        })
        .await
    }
}

/// Queue handler that runs one job to a terminal status.
pub struct RenderJobRunner {
    router: Arc<ProgressRouter>,
    script: Option<Arc<dyn ScriptGenerator>>,
    renderer: Arc<dyn VideoRenderer>,
}

impl RenderJobRunner {
    pub fn new(
        router: Arc<ProgressRouter>,
        script: Option<Arc<dyn ScriptGenerator>>,
        renderer: Arc<dyn VideoRenderer>,
    ) -> Self {
        Self {
            router,
            script,
            renderer,
        }
    }

    /// Resolve the overlay text: caller-supplied wins, otherwise ask the
    /// script service. Failure degrades to no overlay.
    async fn resolve_overlay(&self, job: &mut RenderJob, logger: &JobLogger) -> String {
        if let Some(text) = &job.spec.script_text {
            if !text.trim().is_empty() {
                return text.clone();
            }
        }

        let Some(generator) = &self.script else {
            return String::new();
        };
        if job.spec.prompt.trim().is_empty() {
            return String::new();
        }

        job.advance(JobStatus::GeneratingScript);
        let event = StatusEvent::generating_script(job.id.clone());
        job.set_progress(event.progress);
        self.router.route(&job.session, event).await;

        match generator
            .generate(&job.spec.prompt, job.spec.word_target)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                // a script failure is not a render failure
                logger.log_warning(&format!(
                    "script generation failed, rendering without overlay: {e}"
                ));
                String::new()
            }
        }
    }
}

#[async_trait]
impl JobHandler for RenderJobRunner {
    async fn run(&self, mut job: RenderJob) {
        let logger = JobLogger::new(&job.id, "render_video");
        let session = job.session.clone();

        job.advance(JobStatus::Starting);
        logger.log_start(&format!(
            "{} image(s), {}s, {}",
            job.spec.images.len(),
            job.spec.duration_secs,
            job.spec.size
        ));
        self.router
            .route(&session, StatusEvent::starting(job.id.clone()))
            .await;

        let overlay = self.resolve_overlay(&mut job, &logger).await;

        job.advance(JobStatus::Rendering);
        self.router
            .route(&session, StatusEvent::rendering(job.id.clone(), job.progress))
            .await;

        // Encoder percentages funnel through one forwarder task, which
        // keeps per-job delivery ordered and strictly increasing. Starting
        // from the job's current progress keeps the stream non-decreasing
        // across the script step.
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let forwarder = tokio::spawn({
            let router = Arc::clone(&self.router);
            let session = session.clone();
            let job_id = job.id.clone();
            let mut last = job.progress;
            async move {
                while let Some(pct) = progress_rx.recv().await {
                    if pct > last {
                        last = pct;
                        router
                            .route(&session, StatusEvent::rendering(job_id.clone(), pct))
                            .await;
                    }
                }
            }
        });

        let result = self.renderer.render(&job.spec, &overlay, progress_tx).await;
        let _ = forwarder.await;

        match result {
            Ok(output) => {
                job.complete(&output);
                logger.log_completion(&output.display().to_string());
                self.router
                    .route(
                        &session,
                        StatusEvent::done(job.id.clone(), output.to_string_lossy()),
                    )
                    .await;
            }
            Err(e) => {
                let reason = format!("Render failed: {e}");
                job.fail(&reason);
                logger.log_error(&reason);
                self.router
                    .route(&session, StatusEvent::error(job.id.clone(), reason))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecast_media::MediaError;
    use slidecast_models::{SessionId, SizePreset};
    use std::sync::Mutex;

    struct StubRenderer {
        overlays: Mutex<Vec<String>>,
        fail: bool,
    }

    impl StubRenderer {
        fn new(fail: bool) -> Self {
            Self {
                overlays: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl VideoRenderer for StubRenderer {
        async fn render(
            &self,
            spec: &RenderSpec,
            overlay_text: &str,
            progress: mpsc::UnboundedSender<u8>,
        ) -> MediaResult<PathBuf> {
            self.overlays.lock().unwrap().push(overlay_text.to_string());
            for pct in [25, 60, 98] {
                let _ = progress.send(pct);
            }
            if self.fail {
                Err(MediaError::ffmpeg_failed("boom", None, Some(1)))
            } else {
                Ok(spec.output_path.clone())
            }
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl ScriptGenerator for FailingGenerator {
        async fn generate(&self, _topic: &str, _word_target: u32) -> crate::WorkerResult<String> {
            Err(crate::WorkerError::script_generation("service unreachable"))
        }
    }

    fn job() -> RenderJob {
        RenderJob::new(
            SessionId::new(),
            RenderSpec::new("volcanoes", SizePreset::Reel.dimensions(), 8, "out.mp4"),
        )
    }

    async fn collect_events(
        rx: &mut mpsc::Receiver<StatusEvent>,
    ) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn test_script_failure_still_renders() {
        let router = Arc::new(ProgressRouter::new());
        let renderer = Arc::new(StubRenderer::new(false));
        let runner = RenderJobRunner::new(
            Arc::clone(&router),
            Some(Arc::new(FailingGenerator)),
            Arc::clone(&renderer) as Arc<dyn VideoRenderer>,
        );

        let job = job();
        let mut rx = router.register(&job.session).await;
        runner.run(job).await;

        let events = collect_events(&mut rx).await;
        let statuses: Vec<&str> = events.iter().map(|e| e.status.as_str()).collect();
        assert!(statuses.contains(&"generating_script"));
        assert!(statuses.contains(&"rendering"));
        assert_eq!(*statuses.last().unwrap(), "done");

        // degraded to an empty overlay, not an error
        assert_eq!(*renderer.overlays.lock().unwrap(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_supplied_text_skips_script_step() {
        let router = Arc::new(ProgressRouter::new());
        let renderer = Arc::new(StubRenderer::new(false));
        let runner = RenderJobRunner::new(
            Arc::clone(&router),
            Some(Arc::new(FailingGenerator)),
            Arc::clone(&renderer) as Arc<dyn VideoRenderer>,
        );

        let mut job = job();
        job.spec.script_text = Some("Hand-written overlay".to_string());
        let mut rx = router.register(&job.session).await;
        runner.run(job).await;

        let events = collect_events(&mut rx).await;
        assert!(!events
            .iter()
            .any(|e| e.status == JobStatus::GeneratingScript));
        assert_eq!(
            *renderer.overlays.lock().unwrap(),
            vec!["Hand-written overlay".to_string()]
        );
    }

    #[tokio::test]
    async fn test_progress_is_non_decreasing_and_done_carries_100() {
        let router = Arc::new(ProgressRouter::new());
        let renderer = Arc::new(StubRenderer::new(false));
        let runner = RenderJobRunner::new(Arc::clone(&router), None, renderer);

        let job = job();
        let mut rx = router.register(&job.session).await;
        runner.run(job).await;

        let events = collect_events(&mut rx).await;
        let percents: Vec<u8> = events.iter().map(|e| e.progress).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");

        for event in &events {
            if event.progress == 100 {
                assert_eq!(event.status, JobStatus::Done);
            }
        }
        assert_eq!(events.last().unwrap().progress, 100);
    }

    #[tokio::test]
    async fn test_render_failure_is_terminal_error() {
        let router = Arc::new(ProgressRouter::new());
        let renderer = Arc::new(StubRenderer::new(true));
        let runner = RenderJobRunner::new(Arc::clone(&router), None, renderer);

        let job = job();
        let mut rx = router.register(&job.session).await;
        runner.run(job).await;

        let events = collect_events(&mut rx).await;
        let last = events.last().unwrap();
        assert_eq!(last.status, JobStatus::Error);
        assert!(last.message.as_deref().unwrap().contains("Render failed"));
        assert!(last.output_path.is_none());
    }

    #[tokio::test]
    async fn test_no_generator_and_no_text_renders_without_overlay() {
        let router = Arc::new(ProgressRouter::new());
        let renderer = Arc::new(StubRenderer::new(false));
        let runner = RenderJobRunner::new(
            Arc::clone(&router),
            None,
            Arc::clone(&renderer) as Arc<dyn VideoRenderer>,
        );

        let job = job();
        let mut rx = router.register(&job.session).await;
        runner.run(job).await;

        let events = collect_events(&mut rx).await;
        assert!(!events
            .iter()
            .any(|e| e.status == JobStatus::GeneratingScript));
        assert_eq!(*renderer.overlays.lock().unwrap(), vec![String::new()]);
    }
}
