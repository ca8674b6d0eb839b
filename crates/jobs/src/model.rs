//! Job record model: identity, status, parameters, and results of one
//! generation request.

use chrono::Utc;
use mediamill_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};

/// URL scheme marking an input artifact already staged in the job's
/// input directory by the producer.
pub const STAGED_INPUT_SCHEME: &str = "staged://";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Job lifecycle states.
///
/// Transitions only move forward: `Queued → Running → {Completed |
/// Failed | TimedOut | Canceled}`, plus the direct `Queued → Canceled`
/// edge taken when a job is canceled before the worker picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for the worker.
    Queued,
    /// Being processed by the worker.
    Running,
    /// Finished successfully; `files` holds the outputs.
    Completed,
    /// Finished with an error; `error` holds the description.
    Failed,
    /// The wall-clock budget expired while waiting on the backend.
    TimedOut,
    /// Canceled by an external request.
    Canceled,
}

impl JobStatus {
    /// Whether the status is terminal - no further transitions occur.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut | JobStatus::Canceled
        )
    }

    /// Wire representation, matching the serde encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
            JobStatus::Canceled => "canceled",
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow parameters
// ---------------------------------------------------------------------------

/// Per-variant generation parameters, keyed by the `workflow_type`
/// discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "workflow_type")]
pub enum WorkflowParams {
    /// Image-to-video generation (the default variant).
    #[serde(rename = "im2vid")]
    Im2Vid {
        /// Random seed.
        #[serde(default)]
        seed: Option<u64>,
        /// Video duration in seconds.
        #[serde(default)]
        duration_seconds: Option<u32>,
        /// Frames per second.
        #[serde(default)]
        fps: Option<u32>,
        /// Resolution string, e.g. `"768x768"`.
        #[serde(default)]
        resolution: Option<String>,
    },

    /// Text-to-song generation.
    #[serde(rename = "song")]
    Song {
        /// Song description / style tags.
        #[serde(default)]
        song_description: String,
        /// Song lyrics.
        #[serde(default)]
        song_lyrics: String,
    },
}

impl Default for WorkflowParams {
    fn default() -> Self {
        WorkflowParams::Im2Vid {
            seed: None,
            duration_seconds: None,
            fps: None,
            resolution: None,
        }
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// One generation request, tracked from creation to terminal outcome.
///
/// The persisted form of this struct (the job's `meta.json`) is the
/// contract external status and result-retrieval endpoints read against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque unique identifier, assigned at creation, never reassigned.
    pub id: JobId,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Creation time (UTC).
    pub created_at: Timestamp,
    /// Refreshed on every mutation; never moves backwards.
    pub updated_at: Timestamp,
    /// Generation prompt.
    pub prompt: String,
    /// Input image: an http(s) URL, or a `staged://` marker when the
    /// producer already placed the artifact in the input directory.
    #[serde(default)]
    pub input_image_url: Option<String>,
    /// Backend-assigned run identifier, set once submission succeeds.
    #[serde(default)]
    pub backend_run_id: Option<String>,
    /// Pipeline progress, 0-100, non-decreasing while non-terminal.
    #[serde(default)]
    pub progress: u8,
    /// Output filenames; populated only on completion.
    #[serde(default)]
    pub files: Vec<String>,
    /// Human-readable failure description.
    #[serde(default)]
    pub error: Option<String>,
    /// Notification chat to deliver results to.
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
    /// Webhook URL to POST the outcome summary to.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Workflow variant and its generation parameters.
    #[serde(default)]
    pub params: WorkflowParams,
}

impl JobRecord {
    /// Create a new record in `Queued` status with a fresh id.
    pub fn new(prompt: impl Into<String>, params: WorkflowParams) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            prompt: prompt.into(),
            input_image_url: None,
            backend_run_id: None,
            progress: 0,
            files: Vec::new(),
            error: None,
            telegram_chat_id: None,
            webhook_url: None,
            params,
        }
    }

    /// Set the input image URL (or staged marker).
    pub fn with_input_image_url(mut self, url: impl Into<String>) -> Self {
        self.input_image_url = Some(url.into());
        self
    }

    /// Set the notification chat id.
    pub fn with_telegram_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.telegram_chat_id = Some(chat_id.into());
        self
    }

    /// Set the outcome webhook URL.
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Whether the input artifact was pre-staged by the producer.
    pub fn uses_staged_input(&self) -> bool {
        self.input_image_url
            .as_deref()
            .is_some_and(|url| url.starts_with(STAGED_INPUT_SCHEME))
    }
}

// ---------------------------------------------------------------------------
// JobPatch
// ---------------------------------------------------------------------------

/// Typed partial update applied by [`JobStore::update`](crate::store::JobStore::update).
///
/// Unset fields leave the record untouched.
#[derive(Debug, Default, Clone)]
pub struct JobPatch {
    status: Option<JobStatus>,
    backend_run_id: Option<String>,
    progress: Option<u8>,
    files: Option<Vec<String>>,
    error: Option<String>,
}

impl JobPatch {
    /// An empty patch (only refreshes `updated_at` when applied).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status.
    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the backend run identifier.
    pub fn backend_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.backend_run_id = Some(run_id.into());
        self
    }

    /// Set the progress checkpoint.
    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set the output file list.
    pub fn files(mut self, files: Vec<String>) -> Self {
        self.files = Some(files);
        self
    }

    /// Set the failure description.
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Apply the patch to a record, refreshing `updated_at`.
    ///
    /// Progress never moves backwards: a lower value than the record's
    /// current progress is ignored.
    pub fn apply(self, record: &mut JobRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(run_id) = self.backend_run_id {
            record.backend_run_id = Some(run_id);
        }
        if let Some(progress) = self.progress {
            record.progress = record.progress.max(progress);
        }
        if let Some(files) = self.files {
            record.files = files;
        }
        if let Some(error) = self.error {
            record.error = Some(error);
        }
        record.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- status ---------------------------------------------------------------

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
    }

    // -- params ---------------------------------------------------------------

    #[test]
    fn params_roundtrip_with_discriminator() {
        let params = WorkflowParams::Song {
            song_description: "upbeat".to_string(),
            song_lyrics: "la la".to_string(),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["workflow_type"], "song");

        let back: WorkflowParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn im2vid_params_tolerate_unknown_fields() {
        // Forward-compatible patches may carry fields this version does
        // not know about.
        let json = serde_json::json!({
            "workflow_type": "im2vid",
            "seed": 7,
            "motion_strength": 0.8
        });
        let params: WorkflowParams = serde_json::from_value(json).unwrap();
        assert_eq!(
            params,
            WorkflowParams::Im2Vid {
                seed: Some(7),
                duration_seconds: None,
                fps: None,
                resolution: None,
            }
        );
    }

    // -- record ---------------------------------------------------------------

    #[test]
    fn new_record_is_queued_with_unique_id() {
        let a = JobRecord::new("p", WorkflowParams::default());
        let b = JobRecord::new("p", WorkflowParams::default());
        assert_eq!(a.status, JobStatus::Queued);
        assert_eq!(a.progress, 0);
        assert!(a.files.is_empty());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn staged_marker_detection() {
        let staged = JobRecord::new("p", WorkflowParams::default())
            .with_input_image_url("staged://upload");
        let remote = JobRecord::new("p", WorkflowParams::default())
            .with_input_image_url("https://example.com/a.png");
        assert!(staged.uses_staged_input());
        assert!(!remote.uses_staged_input());
    }

    // -- patch ----------------------------------------------------------------

    #[test]
    fn patch_applies_fields_and_refreshes_updated_at() {
        let mut record = JobRecord::new("p", WorkflowParams::default());
        let before = record.updated_at;

        JobPatch::new()
            .status(JobStatus::Running)
            .progress(10)
            .apply(&mut record);

        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.progress, 10);
        assert!(record.updated_at >= before);
    }

    #[test]
    fn patch_never_lowers_progress() {
        let mut record = JobRecord::new("p", WorkflowParams::default());
        JobPatch::new().progress(50).apply(&mut record);
        JobPatch::new().progress(10).apply(&mut record);
        assert_eq!(record.progress, 50);
    }
}
