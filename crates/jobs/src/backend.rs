//! The Generation Backend seam consumed by the worker.
//!
//! The worker only needs four operations from the backend; everything
//! else about the ComfyUI protocol stays behind [`ComfyApi`]. Tests
//! substitute their own implementations.

use std::path::Path;

use async_trait::async_trait;
use mediamill_comfyui::history::{OutputFile, RunState};
use mediamill_comfyui::{interpret_history, ComfyApi};

/// Operations the worker performs against the generation backend.
///
/// Errors carry only a displayable message; the worker maps them to the
/// job's terminal `error` field. Whether an error is retried depends on
/// the pipeline stage, not the error value: `poll_run` failures are
/// transient and retried until the job's wall-clock budget expires,
/// failures anywhere else fail the job.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Upload a staged input artifact; returns the backend-side filename.
    async fn upload_input(&self, path: &Path) -> anyhow::Result<String>;

    /// Submit a workflow document; returns the backend run identifier.
    async fn submit(&self, workflow: &serde_json::Value) -> anyhow::Result<String>;

    /// Query the current state of a submitted run.
    async fn poll_run(&self, run_id: &str) -> anyhow::Result<RunState>;

    /// Download one reported output file into `dest`.
    async fn fetch_output(&self, file: &OutputFile, dest: &Path) -> anyhow::Result<()>;
}

#[async_trait]
impl GenerationBackend for ComfyApi {
    async fn upload_input(&self, path: &Path) -> anyhow::Result<String> {
        Ok(self.upload_image(path).await?)
    }

    async fn submit(&self, workflow: &serde_json::Value) -> anyhow::Result<String> {
        Ok(self.submit_workflow(workflow).await?.prompt_id)
    }

    async fn poll_run(&self, run_id: &str) -> anyhow::Result<RunState> {
        let history = self.get_history(run_id).await?;
        Ok(interpret_history(&history, run_id))
    }

    async fn fetch_output(&self, file: &OutputFile, dest: &Path) -> anyhow::Result<()> {
        Ok(self.download_output(file, dest).await?)
    }
}
