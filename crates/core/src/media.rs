//! Media filename classification.
//!
//! Output artifacts are located by matching known media extensions - the
//! delivery layer picks the first video-like (else audio-like) file, and
//! result-retrieval endpoints use the same matching against a job's output
//! directory.

// ---------------------------------------------------------------------------
// Extension constants
// ---------------------------------------------------------------------------

/// Extensions treated as video-like output (includes animated images).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "gif"];

/// Extensions treated as audio-like output.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a"];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Whether a filename looks like a video output, by extension.
///
/// Matching is case-insensitive and ignores any leading path components.
pub fn is_video_filename(name: &str) -> bool {
    has_extension_in(name, VIDEO_EXTENSIONS)
}

/// Whether a filename looks like an audio output, by extension.
pub fn is_audio_filename(name: &str) -> bool {
    has_extension_in(name, AUDIO_EXTENSIONS)
}

/// First video-like filename in `files`, if any.
pub fn first_video<'a>(files: &'a [String]) -> Option<&'a str> {
    files
        .iter()
        .map(String::as_str)
        .find(|f| is_video_filename(f))
}

/// First audio-like filename in `files`, if any.
pub fn first_audio<'a>(files: &'a [String]) -> Option<&'a str> {
    files
        .iter()
        .map(String::as_str)
        .find(|f| is_audio_filename(f))
}

fn has_extension_in(name: &str, extensions: &[&str]) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
