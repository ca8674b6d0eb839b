//! Input artifact staging for the media-from-image pipeline.
//!
//! Two input sources exist: a `staged://` marker, meaning the producer
//! already placed the artifact in the job's input directory, and an
//! http(s) URL the worker downloads itself. Downloads are idempotent -
//! an already-staged file is never fetched again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::STAGED_INPUT_SCHEME;

/// Filename a downloaded input is staged under.
const STAGED_FILENAME: &str = "input.png";

/// Extensions a pre-staged input is located by.
const STAGED_EXTENSIONS: &[&str] = &["png", "jpg"];

/// Timeout for the input download request.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from input staging.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// The marker said the input was pre-staged, but nothing is there.
    #[error("Staged input image not found in input directory")]
    StagedInputMissing,

    /// Downloading the input over HTTP failed.
    #[error("Input download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// Writing the staged file (or scanning the directory) failed.
    #[error("Input staging I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Stage the input artifact for one job and return its path.
pub async fn stage_input(
    input_dir: &Path,
    input_image_url: &str,
    http: &reqwest::Client,
) -> Result<PathBuf, StagingError> {
    if input_image_url.starts_with(STAGED_INPUT_SCHEME) {
        return find_staged(input_dir).await;
    }

    let dest = input_dir.join(STAGED_FILENAME);
    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        return Ok(dest);
    }

    let response = http
        .get(input_image_url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    let bytes = response.bytes().await?;

    tokio::fs::create_dir_all(input_dir).await?;
    tokio::fs::write(&dest, &bytes).await?;
    tracing::debug!(url = %input_image_url, dest = %dest.display(), "Staged input image");

    Ok(dest)
}

/// Locate a pre-staged input by extension.
async fn find_staged(input_dir: &Path) -> Result<PathBuf, StagingError> {
    let mut entries = match tokio::fs::read_dir(input_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StagingError::StagedInputMissing)
        }
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| STAGED_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)));
        if matches {
            return Ok(path);
        }
    }

    Err(StagingError::StagedInputMissing)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
