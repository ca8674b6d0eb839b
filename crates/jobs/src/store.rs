//! File-backed durable job store.
//!
//! Each job owns one directory under the storage root:
//!
//! ```text
//! <root>/<job_id>/meta.json   - the serialized job record
//! <root>/<job_id>/input/      - staged input artifacts
//! <root>/<job_id>/output/     - retrieved output artifacts
//! ```
//!
//! The record file is replaced atomically as a whole (write a temp file,
//! then rename), so concurrent readers never observe a partially written
//! record. There is no file locking: correctness relies on there being a
//! single writer per field at any time.

use std::path::{Path, PathBuf};

use crate::model::{JobPatch, JobRecord, JobStatus};

/// Record filename inside a job directory.
const META_FILE: &str = "meta.json";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the durable job store.
///
/// A missing job is not an error: `load`/`update` return `Ok(None)` and
/// `cancel` returns [`CancelOutcome::NotFound`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the job directory failed.
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The record could not be serialized or deserialized.
    #[error("Job record (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result of a cancellation request.
#[derive(Debug)]
pub enum CancelOutcome {
    /// The job was non-terminal and is now `Canceled`.
    Canceled(JobRecord),
    /// The job had already reached a terminal status.
    AlreadyFinished(JobStatus),
    /// No such job.
    NotFound,
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

/// File-backed job record storage.
pub struct JobStore {
    root: PathBuf,
}

impl JobStore {
    /// Open (and create, if absent) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a job's staged input artifacts.
    pub fn input_dir(&self, id: &str) -> PathBuf {
        self.job_dir(id).join("input")
    }

    /// Directory holding a job's retrieved output artifacts.
    pub fn output_dir(&self, id: &str) -> PathBuf {
        self.job_dir(id).join("output")
    }

    /// Persist a record, creating the job's directory tree if absent.
    ///
    /// Replaces any prior record file atomically. Idempotent.
    pub async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let dir = self.job_dir(&record.id);
        tokio::fs::create_dir_all(dir.join("input")).await?;
        tokio::fs::create_dir_all(dir.join("output")).await?;

        let bytes = serde_json::to_vec_pretty(record)?;

        // Write-temp-then-rename: readers see either the old record or
        // the new one, never a torn write.
        let final_path = dir.join(META_FILE);
        let tmp_path = dir.join(format!("{META_FILE}.tmp"));
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        Ok(())
    }

    /// Load a record. Returns `Ok(None)` when the job does not exist.
    pub async fn load(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        let bytes = match tokio::fs::read(self.meta_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Load-mutate-save in one logical unit.
    ///
    /// Always refreshes `updated_at`. Returns `Ok(None)` - and creates
    /// nothing - when the job does not exist.
    pub async fn update(&self, id: &str, patch: JobPatch) -> Result<Option<JobRecord>, StoreError> {
        let Some(mut record) = self.load(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut record);
        self.save(&record).await?;
        Ok(Some(record))
    }

    /// Whether a record exists for `id`.
    pub async fn exists(&self, id: &str) -> bool {
        tokio::fs::try_exists(self.meta_path(id)).await.unwrap_or(false)
    }

    /// Cancel a job: transition a non-terminal record to `Canceled`.
    ///
    /// This is the only write path besides the worker; it touches no
    /// field the worker owns other than `status`.
    pub async fn cancel(&self, id: &str) -> Result<CancelOutcome, StoreError> {
        let Some(record) = self.load(id).await? else {
            return Ok(CancelOutcome::NotFound);
        };
        if record.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyFinished(record.status));
        }

        let updated = self
            .update(id, JobPatch::new().status(JobStatus::Canceled))
            .await?
            .unwrap_or(record);
        tracing::info!(job_id = %id, "Job canceled");
        Ok(CancelOutcome::Canceled(updated))
    }

    // ---- private helpers ----

    fn job_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.root.join(id).join(META_FILE)
    }
}
