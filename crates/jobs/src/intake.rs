//! The enqueue contract producers call to enter the pipeline.
//!
//! A record must be durably saved *and* handed to the queue, in that
//! order - save alone leaves it invisible to the worker, enqueue alone
//! leaves it lost on restart. Validation runs first so malformed
//! requests never reach disk or the worker.

use mediamill_core::{params, CoreError};

use crate::model::{JobRecord, WorkflowParams};
use crate::queue::JobQueue;
use crate::store::{JobStore, StoreError};

/// Errors from job intake.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The request parameters are malformed or out of range.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// Durably saving the record failed; the job was not enqueued.
    #[error("Failed to persist job record: {0}")]
    Store(#[from] StoreError),
}

/// Validate, durably save, then enqueue a new job record.
pub async fn enqueue_job(
    store: &JobStore,
    queue: &JobQueue,
    record: JobRecord,
) -> Result<(), IntakeError> {
    validate(&record)?;
    store.save(&record).await?;
    tracing::info!(job_id = %record.id, "Job accepted");
    queue.enqueue(record);
    Ok(())
}

/// Validate a record's prompt and variant parameters.
fn validate(record: &JobRecord) -> Result<(), CoreError> {
    match &record.params {
        WorkflowParams::Im2Vid {
            seed,
            duration_seconds,
            fps,
            resolution,
        } => {
            params::validate_prompt(&record.prompt)?;
            params::validate_im2vid_params(*seed, *duration_seconds, *fps, resolution.as_deref())
        }
        WorkflowParams::Song {
            song_description,
            song_lyrics,
        } => params::validate_song_params(song_description, song_lyrics),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
