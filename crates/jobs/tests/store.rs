//! Integration tests for the durable file-backed job store.

use assert_matches::assert_matches;
use mediamill_jobs::{
    CancelOutcome, JobPatch, JobRecord, JobStatus, JobStore, WorkflowParams,
};

async fn open_store(dir: &tempfile::TempDir) -> JobStore {
    JobStore::open(dir.path()).await.unwrap()
}

fn full_record() -> JobRecord {
    JobRecord::new(
        "a red fox running through snow",
        WorkflowParams::Im2Vid {
            seed: Some(42),
            duration_seconds: Some(5),
            fps: Some(24),
            resolution: Some("768x768".to_string()),
        },
    )
    .with_input_image_url("https://example.com/a.png")
    .with_telegram_chat_id("1234")
    .with_webhook_url("https://example.com/hook")
}

// ---------------------------------------------------------------------------
// Test: save then load round-trips every field
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_then_load_roundtrips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let record = full_record();
    store.save(&record).await.unwrap();

    let loaded = store.load(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded, record);
}

// ---------------------------------------------------------------------------
// Test: the on-disk layout matches the persisted-record contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_creates_record_file_and_artifact_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let record = full_record();
    store.save(&record).await.unwrap();

    let job_dir = dir.path().join(&record.id);
    assert!(job_dir.join("meta.json").is_file());
    assert!(job_dir.join("input").is_dir());
    assert!(job_dir.join("output").is_dir());
    // The temp file from the atomic replace must not linger.
    assert!(!job_dir.join("meta.json.tmp").exists());

    assert_eq!(store.input_dir(&record.id), job_dir.join("input"));
    assert_eq!(store.output_dir(&record.id), job_dir.join("output"));
}

// ---------------------------------------------------------------------------
// Test: save is idempotent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_twice_replaces_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut record = full_record();
    store.save(&record).await.unwrap();

    record.prompt = "a different prompt".to_string();
    store.save(&record).await.unwrap();

    let loaded = store.load(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.prompt, "a different prompt");
}

// ---------------------------------------------------------------------------
// Test: load / update / exists on a missing job
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_job_is_not_found_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    assert!(store.load("no-such-job").await.unwrap().is_none());
    assert!(!store.exists("no-such-job").await);

    let updated = store
        .update("no-such-job", JobPatch::new().status(JobStatus::Running))
        .await
        .unwrap();
    assert!(updated.is_none());
    // Update must not have created anything.
    assert!(!dir.path().join("no-such-job").exists());
}

// ---------------------------------------------------------------------------
// Test: update applies fields and refreshes updated_at
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_applies_patch_and_refreshes_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let record = full_record();
    store.save(&record).await.unwrap();

    let updated = store
        .update(
            &record.id,
            JobPatch::new()
                .status(JobStatus::Running)
                .progress(10)
                .backend_run_id("run-9"),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.status, JobStatus::Running);
    assert_eq!(updated.progress, 10);
    assert_eq!(updated.backend_run_id.as_deref(), Some("run-9"));
    assert!(updated.updated_at >= record.updated_at);

    // The persisted copy matches what update returned.
    let loaded = store.load(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded, updated);
}

// ---------------------------------------------------------------------------
// Test: progress never moves backwards through update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_never_lowers_progress() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let record = full_record();
    store.save(&record).await.unwrap();

    store
        .update(&record.id, JobPatch::new().progress(50))
        .await
        .unwrap();
    let after = store
        .update(&record.id, JobPatch::new().progress(20))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(after.progress, 50);
}

// ---------------------------------------------------------------------------
// Test: cancellation contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_transitions_a_queued_job() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let record = full_record();
    store.save(&record).await.unwrap();

    let outcome = store.cancel(&record.id).await.unwrap();
    assert_matches!(outcome, CancelOutcome::Canceled(r) if r.status == JobStatus::Canceled);

    let loaded = store.load(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::Canceled);
}

#[tokio::test]
async fn cancel_reports_already_finished_for_terminal_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let record = full_record();
    store.save(&record).await.unwrap();
    store
        .update(&record.id, JobPatch::new().status(JobStatus::Completed))
        .await
        .unwrap();

    let outcome = store.cancel(&record.id).await.unwrap();
    assert_matches!(outcome, CancelOutcome::AlreadyFinished(JobStatus::Completed));

    // The record is untouched.
    let loaded = store.load(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::Completed);
}

#[tokio::test]
async fn cancel_missing_job_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let outcome = store.cancel("no-such-job").await.unwrap();
    assert_matches!(outcome, CancelOutcome::NotFound);
}

// ---------------------------------------------------------------------------
// Test: a corrupted record surfaces as an error, not a silent miss
// ---------------------------------------------------------------------------

#[tokio::test]
async fn corrupted_record_is_a_serde_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let record = full_record();
    store.save(&record).await.unwrap();

    let meta = dir.path().join(&record.id).join("meta.json");
    tokio::fs::write(&meta, b"{not json").await.unwrap();

    assert!(store.load(&record.id).await.is_err());
}
