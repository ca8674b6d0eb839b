//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (workflow submission, history retrieval,
//! image upload, output download, reachability probing) using [`reqwest`].

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::history::OutputFile;

/// Timeout for workflow submission requests.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for history queries.
const HISTORY_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for image uploads.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for output downloads (generated media can be large).
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for the reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a single ComfyUI instance.
pub struct ComfyApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i32,
}

/// Response returned by the `/upload/image` endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    /// Server-side filename the image was stored under.
    name: String,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Reading or writing a local file failed.
    #[error("File I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ComfyApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Base HTTP API URL (e.g. `http://127.0.0.1:8188`).
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow JSON.
    /// Returns the server-assigned `prompt_id` and queue position.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyApiError> {
        let body = serde_json::json!({ "prompt": workflow });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .timeout(SUBMIT_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. The returned document
    /// is keyed by prompt id; an absent key means the run has not finished
    /// executing yet. Interpret it with
    /// [`interpret_history`](crate::history::interpret_history).
    pub async fn get_history(
        &self,
        prompt_id: &str,
    ) -> Result<serde_json::Value, ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .timeout(HISTORY_TIMEOUT)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Upload a local image so a workflow can reference it.
    ///
    /// Sends a multipart `POST /upload/image` request. Returns the
    /// server-side filename, which may differ from the local name if the
    /// server deduplicates.
    pub async fn upload_image(&self, image_path: &Path) -> Result<String, ComfyApiError> {
        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.png".to_string());

        let bytes = tokio::fs::read(image_path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("overwrite", "false");

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        let upload: UploadResponse = Self::parse_response(response).await?;
        tracing::debug!(local = %file_name, remote = %upload.name, "Uploaded input image");
        Ok(upload.name)
    }

    /// Download one output file into `dest`.
    ///
    /// Sends a `GET /view` request and streams the body to disk, creating
    /// parent directories as needed.
    pub async fn download_output(
        &self,
        file: &OutputFile,
        dest: &Path,
    ) -> Result<(), ComfyApiError> {
        let mut request = self
            .client
            .get(format!("{}/view", self.api_url))
            .timeout(DOWNLOAD_TIMEOUT)
            .query(&[("filename", file.filename.as_str()), ("type", file.file_type.as_str())]);
        if !file.subfolder.is_empty() {
            request = request.query(&[("subfolder", file.subfolder.as_str())]);
        }

        let mut response = Self::ensure_success(request.send().await?).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        Ok(())
    }

    /// Check whether the ComfyUI server is reachable.
    ///
    /// Probes `GET /system_stats` with a short timeout.
    pub async fn is_reachable(&self) -> bool {
        self.client
            .get(format!("{}/system_stats", self.api_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Measure round-trip latency to the ComfyUI server.
    ///
    /// Returns `None` when the server is unreachable or unhealthy.
    pub async fn latency_ms(&self) -> Option<u64> {
        let start = Instant::now();
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        Some(start.elapsed().as_millis() as u64)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyApiError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
