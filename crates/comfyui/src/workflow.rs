//! Workflow template substitution.
//!
//! Workflow documents are built by replacing well-known placeholder
//! tokens inside a JSON template with request parameters, then parsing
//! the result. Optional placeholders absent from a template are simply
//! not replaced, so templates only carry the tokens they need.

use serde_json::Value;

// ---------------------------------------------------------------------------
// Placeholder tokens
// ---------------------------------------------------------------------------

/// Token replaced with the uploaded input image filename.
pub const IMAGE_PLACEHOLDER: &str = "IMAGE_PLACEHOLDER";
/// Token replaced with the (escaped) generation prompt.
pub const PROMPT_PLACEHOLDER: &str = "PLACEHOLDER";
/// Token replaced with the random seed.
pub const SEED_PLACEHOLDER: &str = "SEED_PLACEHOLDER";
/// Token replaced with the video duration in seconds.
pub const DURATION_PLACEHOLDER: &str = "DURATION_PLACEHOLDER";
/// Token replaced with the frames-per-second value.
pub const FPS_PLACEHOLDER: &str = "FPS_PLACEHOLDER";
/// Token replaced with the resolution string (e.g. `768x768`).
pub const RESOLUTION_PLACEHOLDER: &str = "RESOLUTION_PLACEHOLDER";
/// Token replaced with the (escaped) song description.
pub const SONG_DESCRIPTION_PLACEHOLDER: &str = "DESCRIPTION-OF-SONG";
/// Token replaced with the (escaped) song lyrics.
pub const SONG_LYRICS_PLACEHOLDER: &str = "LYRICS-OF-SONG";

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Parameters substituted into an image-to-video workflow template.
#[derive(Debug, Default)]
pub struct Im2VidOverrides<'a> {
    /// Generation prompt.
    pub prompt: &'a str,
    /// Backend-side filename of the uploaded input image.
    pub input_filename: Option<&'a str>,
    /// Random seed.
    pub seed: Option<u64>,
    /// Video duration in seconds.
    pub duration_seconds: Option<u32>,
    /// Frames per second.
    pub fps: Option<u32>,
    /// Resolution string, e.g. `"768x768"`.
    pub resolution: Option<&'a str>,
}

/// Errors from workflow template substitution.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The template was not valid JSON after substitution.
    #[error("Workflow template is not valid JSON after substitution: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Build an image-to-video workflow document from a template.
///
/// The image token must be replaced before the prompt token: the prompt
/// token is a substring of the image token.
pub fn apply_overrides(template: &str, overrides: &Im2VidOverrides<'_>) -> Result<Value, WorkflowError> {
    let mut workflow = template.to_string();

    if let Some(input_filename) = overrides.input_filename {
        workflow = workflow.replace(IMAGE_PLACEHOLDER, input_filename);
    }
    workflow = workflow.replace(PROMPT_PLACEHOLDER, &escape_for_json(overrides.prompt));

    if let Some(seed) = overrides.seed {
        workflow = workflow.replace(SEED_PLACEHOLDER, &seed.to_string());
    }
    if let Some(duration) = overrides.duration_seconds {
        workflow = workflow.replace(DURATION_PLACEHOLDER, &duration.to_string());
    }
    if let Some(fps) = overrides.fps {
        workflow = workflow.replace(FPS_PLACEHOLDER, &fps.to_string());
    }
    if let Some(resolution) = overrides.resolution {
        workflow = workflow.replace(RESOLUTION_PLACEHOLDER, resolution);
    }

    Ok(serde_json::from_str(&workflow)?)
}

/// Build a text-to-song workflow document from a template.
pub fn apply_song_overrides(
    template: &str,
    description: &str,
    lyrics: &str,
) -> Result<Value, WorkflowError> {
    let workflow = template
        .replace(SONG_DESCRIPTION_PLACEHOLDER, &escape_for_json(description))
        .replace(SONG_LYRICS_PLACEHOLDER, &escape_for_json(lyrics));

    Ok(serde_json::from_str(&workflow)?)
}

/// Escape free text so it can be spliced into a JSON string literal.
fn escape_for_json(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_substituted() {
        let template = r#"{"6": {"inputs": {"text": "PLACEHOLDER"}}}"#;
        let overrides = Im2VidOverrides {
            prompt: "a red fox",
            ..Default::default()
        };
        let workflow = apply_overrides(template, &overrides).unwrap();
        assert_eq!(workflow["6"]["inputs"]["text"], "a red fox");
    }

    #[test]
    fn image_token_replaced_before_prompt_token() {
        // IMAGE_PLACEHOLDER contains PLACEHOLDER as a substring; a wrong
        // replacement order would corrupt the image filename.
        let template = r#"{"img": "IMAGE_PLACEHOLDER", "text": "PLACEHOLDER"}"#;
        let overrides = Im2VidOverrides {
            prompt: "a red fox",
            input_filename: Some("upload_001.png"),
            ..Default::default()
        };
        let workflow = apply_overrides(template, &overrides).unwrap();
        assert_eq!(workflow["img"], "upload_001.png");
        assert_eq!(workflow["text"], "a red fox");
    }

    #[test]
    fn quotes_and_newlines_are_escaped() {
        let template = r#"{"text": "PLACEHOLDER"}"#;
        let overrides = Im2VidOverrides {
            prompt: "say \"hi\"\nand wave",
            ..Default::default()
        };
        let workflow = apply_overrides(template, &overrides).unwrap();
        assert_eq!(workflow["text"], "say \"hi\"\nand wave");
    }

    #[test]
    fn backslash_in_prompt_survives() {
        let template = r#"{"text": "PLACEHOLDER"}"#;
        let overrides = Im2VidOverrides {
            prompt: r"C:\prompts",
            ..Default::default()
        };
        let workflow = apply_overrides(template, &overrides).unwrap();
        assert_eq!(workflow["text"], r"C:\prompts");
    }

    #[test]
    fn numeric_placeholders_substituted_when_present() {
        let template = r#"{"seed": SEED_PLACEHOLDER, "fps": FPS_PLACEHOLDER, "text": "PLACEHOLDER"}"#;
        let overrides = Im2VidOverrides {
            prompt: "p",
            seed: Some(42),
            fps: Some(24),
            ..Default::default()
        };
        let workflow = apply_overrides(template, &overrides).unwrap();
        assert_eq!(workflow["seed"], 42);
        assert_eq!(workflow["fps"], 24);
    }

    #[test]
    fn absent_optional_params_leave_template_untouched() {
        // A template without optional tokens must not require them.
        let template = r#"{"text": "PLACEHOLDER"}"#;
        let overrides = Im2VidOverrides {
            prompt: "p",
            ..Default::default()
        };
        assert!(apply_overrides(template, &overrides).is_ok());
    }

    #[test]
    fn song_tokens_substituted() {
        let template =
            r#"{"desc": "DESCRIPTION-OF-SONG", "lyrics": "LYRICS-OF-SONG"}"#;
        let workflow = apply_song_overrides(template, "upbeat synthwave", "la la\nla").unwrap();
        assert_eq!(workflow["desc"], "upbeat synthwave");
        assert_eq!(workflow["lyrics"], "la la\nla");
    }

    #[test]
    fn invalid_template_reports_parse_error() {
        let overrides = Im2VidOverrides {
            prompt: "p",
            ..Default::default()
        };
        assert!(apply_overrides("{not json", &overrides).is_err());
    }
}
