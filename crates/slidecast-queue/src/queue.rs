//! Bounded-concurrency render queue.
//!
//! `submit` returns immediately; a single dispatch task pulls jobs off a
//! FIFO and acquires one of K semaphore permits before spawning each job,
//! so start order matches submission order and at most K jobs run at once.
//! Completion order is unconstrained. A job failing (or panicking) only
//! takes down its own task.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use slidecast_models::{JobId, RenderJob};

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Concurrency ceiling K
    pub max_concurrent_jobs: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("SLIDECAST_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(2),
        }
    }
}

/// Runs one job to its terminal status.
///
/// Implementations report failures through the progress channel and must
/// not assume anything about sibling jobs.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn run(&self, job: RenderJob);
}

/// The queue: owns job lifetime from submission to terminal status.
pub struct RenderQueue {
    tx: mpsc::UnboundedSender<RenderJob>,
    dispatcher: JoinHandle<()>,
    semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
}

impl RenderQueue {
    /// Start the dispatch loop with the given handler.
    pub fn start<H: JobHandler>(config: QueueConfig, handler: Arc<H>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<RenderJob>();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let dispatch_semaphore = Arc::clone(&semaphore);

        info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            "starting render queue"
        );

        let dispatcher = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                // Blocking on the permit here is what preserves FIFO start
                // order: the next job is not even looked at until a slot
                // frees up.
                let permit = match dispatch_semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let job_id = job.id.clone();
                debug!(job_id = %job_id, "dispatching job");

                let handler = Arc::clone(&handler);
                let task = tokio::spawn(async move {
                    let _permit = permit;
                    handler.run(job).await;
                });

                // Reap in the background so a panicking job is logged but
                // never stalls dispatch or its siblings.
                tokio::spawn(async move {
                    if let Err(e) = task.await {
                        if e.is_panic() {
                            error!(job_id = %job_id, "job task panicked");
                        }
                    }
                });
            }
            debug!("dispatch loop finished");
        });

        Self {
            tx,
            dispatcher,
            semaphore,
            max_concurrent_jobs: config.max_concurrent_jobs,
        }
    }

    /// Enqueue a job; returns its identifier immediately.
    pub fn submit(&self, job: RenderJob) -> QueueResult<JobId> {
        let id = job.id.clone();
        self.tx
            .send(job)
            .map_err(|_| QueueError::ShuttingDown)?;
        debug!(job_id = %id, "job submitted");
        Ok(id)
    }

    /// Free slots right now (0 when K jobs are running).
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// The concurrency ceiling K.
    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Stop accepting jobs, then wait for queued and running jobs to
    /// finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.dispatcher.await;

        // all permits back means no job task is still holding one
        let _ = self
            .semaphore
            .acquire_many(self.max_concurrent_jobs as u32)
            .await;
        info!("render queue drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecast_models::{RenderSpec, SessionId, SizePreset};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn test_job() -> RenderJob {
        RenderJob::new(
            SessionId::new(),
            RenderSpec::new("topic", SizePreset::Reel.dimensions(), 8, "out.mp4"),
        )
    }

    /// Records run order and tracks peak concurrency.
    struct ProbeHandler {
        running: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<JobId>>,
        hold: Duration,
    }

    impl ProbeHandler {
        fn new(hold: Duration) -> Self {
            Self {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
                hold,
            }
        }
    }

    #[async_trait]
    impl JobHandler for ProbeHandler {
        async fn run(&self, job: RenderJob) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.started.lock().unwrap().push(job.id.clone());

            tokio::time::sleep(self.hold).await;

            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_holds() {
        let handler = Arc::new(ProbeHandler::new(Duration::from_millis(50)));
        let queue = RenderQueue::start(
            QueueConfig {
                max_concurrent_jobs: 2,
            },
            Arc::clone(&handler),
        );

        for _ in 0..5 {
            queue.submit(test_job()).unwrap();
        }
        queue.shutdown().await;

        assert_eq!(handler.started.lock().unwrap().len(), 5);
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_fifo_start_order() {
        let handler = Arc::new(ProbeHandler::new(Duration::from_millis(10)));
        let queue = RenderQueue::start(
            QueueConfig {
                max_concurrent_jobs: 1,
            },
            Arc::clone(&handler),
        );

        let mut submitted = Vec::new();
        for _ in 0..4 {
            let job = test_job();
            submitted.push(job.id.clone());
            queue.submit(job).unwrap();
        }
        queue.shutdown().await;

        assert_eq!(*handler.started.lock().unwrap(), submitted);
    }

    /// Fails (panics) on every even job, counts completions on odd ones.
    struct FlakyHandler {
        completed: AtomicUsize,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn run(&self, _job: RenderJob) {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                panic!("job blew up");
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let handler = Arc::new(FlakyHandler {
            completed: AtomicUsize::new(0),
            seen: AtomicUsize::new(0),
        });
        let queue = RenderQueue::start(
            QueueConfig {
                max_concurrent_jobs: 1,
            },
            Arc::clone(&handler),
        );

        for _ in 0..6 {
            queue.submit(test_job()).unwrap();
        }
        queue.shutdown().await;

        assert_eq!(handler.seen.load(Ordering::SeqCst), 6);
        assert_eq!(handler.completed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let handler = Arc::new(ProbeHandler::new(Duration::ZERO));
        let queue = RenderQueue::start(QueueConfig::default(), Arc::clone(&handler));

        let tx = queue.tx.clone();
        queue.shutdown().await;

        assert!(tx.send(test_job()).is_err());
    }

    #[tokio::test]
    async fn test_slots_free_up_after_completion() {
        let handler = Arc::new(ProbeHandler::new(Duration::from_millis(20)));
        let queue = RenderQueue::start(
            QueueConfig {
                max_concurrent_jobs: 2,
            },
            Arc::clone(&handler),
        );
        assert_eq!(queue.available_slots(), 2);

        queue.submit(test_job()).unwrap();
        queue.submit(test_job()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(queue.available_slots(), 0);

        queue.shutdown().await;
    }
}
