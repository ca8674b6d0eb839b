//! Generation parameter limits and validation.
//!
//! Requests are validated at the intake boundary, before a job record is
//! ever persisted - a record that reaches the worker is assumed well-formed.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum prompt length in characters.
pub const MAX_PROMPT_LEN: usize = 1000;

/// Maximum random seed value (u32 range).
pub const MAX_SEED: u64 = u32::MAX as u64;

/// Minimum video duration in seconds.
pub const MIN_DURATION_SECS: u32 = 1;
/// Maximum video duration in seconds.
pub const MAX_DURATION_SECS: u32 = 30;

/// Minimum frames per second.
pub const MIN_FPS: u32 = 1;
/// Maximum frames per second.
pub const MAX_FPS: u32 = 60;

/// All valid output resolutions.
pub const VALID_RESOLUTIONS: &[&str] = &[
    "512x512",
    "768x768",
    "1024x576",
    "1024x1024",
    "1280x720",
];

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a generation prompt: non-empty and at most [`MAX_PROMPT_LEN`]
/// characters.
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.is_empty() || prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(CoreError::Validation(format!(
            "Prompt must be 1-{MAX_PROMPT_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate the optional image-to-video generation parameters.
pub fn validate_im2vid_params(
    seed: Option<u64>,
    duration_seconds: Option<u32>,
    fps: Option<u32>,
    resolution: Option<&str>,
) -> Result<(), CoreError> {
    if let Some(seed) = seed {
        if seed > MAX_SEED {
            return Err(CoreError::Validation(format!(
                "Seed must be 0 to {MAX_SEED}"
            )));
        }
    }

    if let Some(duration) = duration_seconds {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&duration) {
            return Err(CoreError::Validation(format!(
                "Duration must be {MIN_DURATION_SECS}-{MAX_DURATION_SECS} seconds"
            )));
        }
    }

    if let Some(fps) = fps {
        if !(MIN_FPS..=MAX_FPS).contains(&fps) {
            return Err(CoreError::Validation(format!(
                "FPS must be {MIN_FPS}-{MAX_FPS}"
            )));
        }
    }

    if let Some(resolution) = resolution {
        if !VALID_RESOLUTIONS.contains(&resolution) {
            return Err(CoreError::Validation(format!(
                "Resolution must be one of: {}",
                VALID_RESOLUTIONS.join(", ")
            )));
        }
    }

    Ok(())
}

/// Validate text-to-song parameters: at least one of description or lyrics
/// must be non-empty.
pub fn validate_song_params(description: &str, lyrics: &str) -> Result<(), CoreError> {
    if description.trim().is_empty() && lyrics.trim().is_empty() {
        return Err(CoreError::Validation(
            "Song requests need a description or lyrics".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
