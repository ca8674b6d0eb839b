//! Background job worker.
//!
//! A single long-lived task dequeues one job at a time and drives it
//! through a fixed pipeline: admission check, input staging, workflow
//! build, submission, polling, output retrieval, completion, delivery.
//! Every stage persists a progress checkpoint, so a crash mid-pipeline
//! leaves an inspectable record behind.
//!
//! Cancellation and timeout are cooperative: they are observed between
//! backend calls (at pipeline admission and on each poll iteration),
//! never mid-call, so cancellation latency is one poll interval in the
//! worst case.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mediamill_comfyui::history::{OutputFile, RunState};
use mediamill_comfyui::workflow::{self, Im2VidOverrides, WorkflowError};
use mediamill_events::webhook::{JobOutcome, WebhookDelivery};

use crate::backend::GenerationBackend;
use crate::model::{JobPatch, JobRecord, JobStatus, WorkflowParams};
use crate::notify::Notifier;
use crate::queue::JobQueue;
use crate::staging::{self, StagingError};
use crate::store::{JobStore, StoreError};

/// Default wall-clock budget for one job, staging through retrieval.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default backend poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long one dequeue waits before the loop re-checks its stop token.
const DEQUEUE_WAIT: Duration = Duration::from_secs(1);

/// Bounded wait for the loop task to exit during `stop()`.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// Progress checkpoints persisted after each pipeline stage.
const PROGRESS_RUNNING: u8 = 10;
const PROGRESS_INPUT_STAGED: u8 = 20;
const PROGRESS_INPUT_UPLOADED: u8 = 30;
const PROGRESS_WORKFLOW_BUILT: u8 = 40;
const PROGRESS_SUBMITTED: u8 = 50;
const PROGRESS_OUTPUTS_READY: u8 = 80;
const PROGRESS_OUTPUTS_FETCHED: u8 = 90;
const PROGRESS_DONE: u8 = 100;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Worker construction parameters.
///
/// Template paths are fixed for the worker's lifetime - changing one
/// means stop, recreate, start. The backend client, by contrast, can be
/// swapped on a running worker via
/// [`JobWorker::swap_backend`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Image-to-video workflow template path.
    pub workflow_path: PathBuf,
    /// Text-to-song workflow template path.
    pub song_workflow_path: PathBuf,
    /// Wall-clock budget per job.
    pub job_timeout: Duration,
    /// Interval between backend polls.
    pub poll_interval: Duration,
}

impl WorkerConfig {
    /// Config with default timeout and poll interval.
    pub fn new(workflow_path: impl Into<PathBuf>, song_workflow_path: impl Into<PathBuf>) -> Self {
        Self {
            workflow_path: workflow_path.into(),
            song_workflow_path: song_workflow_path.into(),
            job_timeout: DEFAULT_JOB_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Snapshot of the worker's cumulative terminal-outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    /// Jobs that completed successfully.
    pub success: u64,
    /// Jobs that failed.
    pub failed: u64,
    /// Jobs that exceeded the wall-clock budget.
    pub timed_out: u64,
    /// Jobs canceled before or during processing.
    pub canceled: u64,
}

#[derive(Default)]
struct Counters {
    success: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    canceled: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline outcome
// ---------------------------------------------------------------------------

/// Non-success pipeline terminations, mapped to terminal statuses at the
/// per-job boundary.
#[derive(Debug, thiserror::Error)]
enum PipelineError {
    /// The wall-clock budget expired while polling.
    #[error("{0}")]
    Timeout(String),

    /// Cancellation was observed mid-poll.
    #[error("Job was canceled")]
    Canceled,

    /// Anything else: backend errors, I/O, bad templates.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        Self::Failed(e.into())
    }
}

impl From<StagingError> for PipelineError {
    fn from(e: StagingError) -> Self {
        Self::Failed(e.into())
    }
}

impl From<WorkflowError> for PipelineError {
    fn from(e: WorkflowError) -> Self {
        Self::Failed(e.into())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Failed(e.into())
    }
}

// ---------------------------------------------------------------------------
// JobWorker
// ---------------------------------------------------------------------------

/// The single background worker driving jobs to a terminal status.
///
/// One instance exists per process. Construct it, wrap it in an `Arc`,
/// then call [`start`](Self::start).
pub struct JobWorker {
    queue: Arc<JobQueue>,
    store: Arc<JobStore>,
    backend: RwLock<Arc<dyn GenerationBackend>>,
    config: WorkerConfig,
    notifier: Option<Arc<dyn Notifier>>,
    webhook: WebhookDelivery,
    http: reqwest::Client,
    counters: Counters,
    running: AtomicBool,
    loop_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl JobWorker {
    /// Create a worker. It does nothing until [`start`](Self::start).
    pub fn new(
        queue: Arc<JobQueue>,
        store: Arc<JobStore>,
        backend: Arc<dyn GenerationBackend>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            store,
            backend: RwLock::new(backend),
            config,
            notifier: None,
            webhook: WebhookDelivery::new(),
            http: reqwest::Client::new(),
            counters: Counters::default(),
            running: AtomicBool::new(false),
            loop_task: Mutex::new(None),
        }
    }

    /// Attach a notification collaborator.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the webhook delivery service (tests shorten the retry
    /// schedule this way).
    pub fn with_webhook_delivery(mut self, webhook: WebhookDelivery) -> Self {
        self.webhook = webhook;
        self
    }

    /// Spawn the worker loop. A no-op when already running.
    pub fn start(self: &Arc<Self>) {
        let mut loop_task = self.loop_task.lock().expect("worker loop lock poisoned");
        if loop_task.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let worker = Arc::clone(self);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            worker.run_loop(task_cancel).await;
        });

        *loop_task = Some((cancel, handle));
        self.running.store(true, Ordering::Relaxed);
        tracing::info!("Job worker started");
    }

    /// Stop the worker loop, waiting a bounded time for it to exit.
    ///
    /// A job currently being processed keeps running until its next
    /// cooperative check; stop does not preempt it.
    pub async fn stop(&self) {
        let taken = {
            let mut loop_task = self.loop_task.lock().expect("worker loop lock poisoned");
            loop_task.take()
        };
        let Some((cancel, handle)) = taken else {
            return;
        };

        self.running.store(false, Ordering::Relaxed);
        cancel.cancel();
        let _ = tokio::time::timeout(STOP_JOIN_TIMEOUT, handle).await;
        tracing::info!("Job worker stopped");
    }

    /// Whether the worker loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Snapshot the cumulative terminal-outcome counters.
    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Atomically swap the Generation Backend client.
    ///
    /// Takes effect from the next job; a job already in flight keeps the
    /// client it started with.
    pub fn swap_backend(&self, backend: Arc<dyn GenerationBackend>) {
        *self.backend.write().expect("backend lock poisoned") = backend;
        tracing::info!("Generation backend swapped");
    }

    // ---- worker loop ----

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!("Job worker loop running");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                dequeued = self.queue.dequeue(DEQUEUE_WAIT) => {
                    let Some(job) = dequeued else { continue };
                    let job_id = job.id.clone();
                    tracing::info!(job_id = %job_id, "Processing job");

                    // A failure escaping process_job means the store
                    // itself is misbehaving; record what we can and move
                    // on to the next job. The loop never dies.
                    if let Err(e) = self.process_job(job).await {
                        tracing::error!(job_id = %job_id, error = %e, "Unexpected error processing job");
                        let patch = JobPatch::new()
                            .status(JobStatus::Failed)
                            .error(format!("Unexpected error: {e}"));
                        if let Err(e) = self.store.update(&job_id, patch).await {
                            tracing::error!(job_id = %job_id, error = %e, "Failed to persist failure status");
                        }
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
        tracing::info!("Job worker loop exited");
    }

    /// Process one dequeued job through to a terminal status.
    ///
    /// Only store failures propagate; every pipeline outcome is mapped,
    /// persisted, and counted here.
    async fn process_job(&self, job: JobRecord) -> Result<(), StoreError> {
        let started = Instant::now();

        // Admission check against the *persisted* record: cancellation
        // may have landed while the job sat in the queue.
        let Some(persisted) = self.store.load(&job.id).await? else {
            tracing::warn!(job_id = %job.id, "Dequeued job has no persisted record, skipping");
            return Ok(());
        };
        if persisted.status == JobStatus::Canceled {
            tracing::info!(job_id = %job.id, "Job was canceled before processing");
            self.counters.canceled.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        self.store
            .update(
                &job.id,
                JobPatch::new()
                    .status(JobStatus::Running)
                    .progress(PROGRESS_RUNNING),
            )
            .await?;

        match self.run_pipeline(&persisted, started).await {
            Ok(files) => {
                self.store
                    .update(
                        &job.id,
                        JobPatch::new()
                            .status(JobStatus::Completed)
                            .progress(PROGRESS_DONE)
                            .files(files.clone()),
                    )
                    .await?;
                self.counters.success.fetch_add(1, Ordering::Relaxed);
                tracing::info!(job_id = %job.id, files = files.len(), "Job completed");
                self.deliver(&job.id).await;
            }
            Err(PipelineError::Timeout(message)) => {
                self.store
                    .update(
                        &job.id,
                        JobPatch::new().status(JobStatus::TimedOut).error(message),
                    )
                    .await?;
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(job_id = %job.id, "Job timed out");
                self.deliver(&job.id).await;
            }
            Err(PipelineError::Canceled) => {
                self.store
                    .update(&job.id, JobPatch::new().status(JobStatus::Canceled))
                    .await?;
                self.counters.canceled.fetch_add(1, Ordering::Relaxed);
                tracing::info!(job_id = %job.id, "Job canceled during processing");
                // Canceled jobs are not delivered.
            }
            Err(PipelineError::Failed(e)) => {
                self.store
                    .update(
                        &job.id,
                        JobPatch::new()
                            .status(JobStatus::Failed)
                            .error(e.to_string()),
                    )
                    .await?;
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(job_id = %job.id, error = %e, "Job failed");
                self.deliver(&job.id).await;
            }
        }

        Ok(())
    }

    // ---- pipeline stages ----

    /// Drive one job through staging, submission, polling, and output
    /// retrieval. Returns the downloaded filenames on success.
    async fn run_pipeline(
        &self,
        job: &JobRecord,
        started: Instant,
    ) -> Result<Vec<String>, PipelineError> {
        let backend = self.current_backend();

        let workflow = match &job.params {
            WorkflowParams::Song {
                song_description,
                song_lyrics,
            } => {
                let template =
                    tokio::fs::read_to_string(&self.config.song_workflow_path).await?;
                let workflow =
                    workflow::apply_song_overrides(&template, song_description, song_lyrics)?;
                self.store
                    .update(&job.id, JobPatch::new().progress(PROGRESS_WORKFLOW_BUILT))
                    .await?;
                workflow
            }
            WorkflowParams::Im2Vid {
                seed,
                duration_seconds,
                fps,
                resolution,
            } => {
                let input_url = job.input_image_url.as_deref().ok_or_else(|| {
                    PipelineError::Failed(anyhow::anyhow!("Job has no input image"))
                })?;

                let input_path =
                    staging::stage_input(&self.store.input_dir(&job.id), input_url, &self.http)
                        .await?;
                self.store
                    .update(&job.id, JobPatch::new().progress(PROGRESS_INPUT_STAGED))
                    .await?;

                let uploaded = backend.upload_input(&input_path).await?;
                self.store
                    .update(&job.id, JobPatch::new().progress(PROGRESS_INPUT_UPLOADED))
                    .await?;

                let template = tokio::fs::read_to_string(&self.config.workflow_path).await?;
                let workflow = workflow::apply_overrides(
                    &template,
                    &Im2VidOverrides {
                        prompt: &job.prompt,
                        input_filename: Some(&uploaded),
                        seed: *seed,
                        duration_seconds: *duration_seconds,
                        fps: *fps,
                        resolution: resolution.as_deref(),
                    },
                )?;
                self.store
                    .update(&job.id, JobPatch::new().progress(PROGRESS_WORKFLOW_BUILT))
                    .await?;
                workflow
            }
        };

        let run_id = backend.submit(&workflow).await?;
        tracing::info!(job_id = %job.id, run_id = %run_id, "Workflow submitted");
        self.store
            .update(
                &job.id,
                JobPatch::new()
                    .backend_run_id(run_id.clone())
                    .progress(PROGRESS_SUBMITTED),
            )
            .await?;

        let outputs = self
            .poll_for_outputs(job, &run_id, started, backend.as_ref())
            .await?;
        self.store
            .update(&job.id, JobPatch::new().progress(PROGRESS_OUTPUTS_READY))
            .await?;

        let output_dir = self.store.output_dir(&job.id);
        let mut files = Vec::with_capacity(outputs.len());
        for file in &outputs {
            tracing::debug!(job_id = %job.id, filename = %file.filename, "Downloading output");
            backend
                .fetch_output(file, &output_dir.join(&file.filename))
                .await?;
            files.push(file.filename.clone());
        }
        self.store
            .update(&job.id, JobPatch::new().progress(PROGRESS_OUTPUTS_FETCHED))
            .await?;

        Ok(files)
    }

    /// Poll the backend until outputs are present.
    ///
    /// Each iteration checks, in order: the wall-clock budget, an
    /// externally set cancellation, then the backend. Transient backend
    /// errors are retried on the next interval - they are bounded only
    /// by the overall timeout.
    async fn poll_for_outputs(
        &self,
        job: &JobRecord,
        run_id: &str,
        started: Instant,
        backend: &dyn GenerationBackend,
    ) -> Result<Vec<OutputFile>, PipelineError> {
        loop {
            let elapsed = started.elapsed();
            if elapsed > self.config.job_timeout {
                return Err(PipelineError::Timeout(format!(
                    "Job timed out after {:.1}s",
                    elapsed.as_secs_f64()
                )));
            }

            if let Some(current) = self.store.load(&job.id).await? {
                if current.status == JobStatus::Canceled {
                    return Err(PipelineError::Canceled);
                }
            }

            match backend.poll_run(run_id).await {
                Ok(RunState::Completed { outputs }) => {
                    tracing::info!(job_id = %job.id, run_id = %run_id, outputs = outputs.len(), "Run finished");
                    return Ok(outputs);
                }
                Ok(RunState::Failed { message }) => {
                    return Err(PipelineError::Failed(anyhow::anyhow!(
                        "Generation backend error: {message}"
                    )));
                }
                Ok(RunState::Pending) => {}
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "Transient error polling backend, retrying");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    // ---- delivery ----

    /// Invoke the delivery collaborators with the freshly reloaded
    /// record. Failures are logged, never escalated - the job keeps its
    /// terminal status.
    async fn deliver(&self, job_id: &str) {
        let record = match self.store.load(job_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to reload record for delivery");
                return;
            }
        };

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&record).await {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to send notification");
            }
        }

        if let Some(url) = &record.webhook_url {
            let outcome = JobOutcome {
                id: record.id.clone(),
                status: record.status.as_str().to_string(),
                files: record.files.clone(),
                error: record.error.clone(),
            };
            if let Err(e) = self.webhook.deliver(url, &outcome).await {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to call webhook");
            }
        }
    }

    fn current_backend(&self) -> Arc<dyn GenerationBackend> {
        self.backend.read().expect("backend lock poisoned").clone()
    }
}
