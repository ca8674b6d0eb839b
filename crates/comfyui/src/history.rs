//! Interpretation of ComfyUI history documents.
//!
//! `GET /history/{prompt_id}` returns a JSON object keyed by prompt id.
//! An absent key means the run is still executing. A present entry
//! carries a `status` block (which can report an execution error) and an
//! `outputs` object keyed by node id, each node grouping its files under
//! `videos`, `gifs`, `images`, or `audio`.

use serde_json::Value;

/// Node output group keys, checked in this order for every node.
const OUTPUT_GROUPS: &[(&str, OutputKind)] = &[
    ("videos", OutputKind::Video),
    ("gifs", OutputKind::AnimatedImage),
    ("images", OutputKind::Image),
    ("audio", OutputKind::Audio),
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Classification of an output file, derived from the history group it
/// was reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Video file (`videos` group).
    Video,
    /// Animated image (`gifs` group).
    AnimatedImage,
    /// Still image (`images` group).
    Image,
    /// Audio file (`audio` group).
    Audio,
}

/// One output file descriptor reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Backend-side filename.
    pub filename: String,
    /// Subfolder within the backend's output area (often empty).
    pub subfolder: String,
    /// Backend storage area, usually `"output"`.
    pub file_type: String,
    /// Which group the file was reported under.
    pub kind: OutputKind,
}

/// Observed state of a submitted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// The run has not produced a history entry (or outputs) yet.
    Pending,
    /// The backend reported an execution error for the run.
    Failed {
        /// The backend's error message.
        message: String,
    },
    /// The run finished; `outputs` preserves the backend's reporting order.
    Completed {
        /// Output file descriptors, in backend order.
        outputs: Vec<OutputFile>,
    },
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// Interpret a raw history document for one run.
///
/// Returns [`RunState::Pending`] while the run id is absent or its entry
/// has no outputs, [`RunState::Failed`] when the status block reports an
/// execution error, and [`RunState::Completed`] once outputs are present.
pub fn interpret_history(history: &Value, run_id: &str) -> RunState {
    let entry = match history.get(run_id) {
        Some(entry) => entry,
        None => return RunState::Pending,
    };

    if let Some(status) = entry.get("status") {
        let is_error = status
            .get("status_str")
            .and_then(Value::as_str)
            .map(|s| s == "error")
            .unwrap_or(false);
        if is_error {
            return RunState::Failed {
                message: error_message(status),
            };
        }
    }

    match entry.get("outputs").and_then(Value::as_object) {
        Some(outputs) if !outputs.is_empty() => RunState::Completed {
            outputs: collect_output_files(outputs),
        },
        _ => RunState::Pending,
    }
}

/// Extract the first status message as a displayable string.
fn error_message(status: &Value) -> String {
    match status.get("messages").and_then(Value::as_array).and_then(|m| m.first()) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "Unknown error".to_string(),
    }
}

/// Walk the `outputs` object and collect every file descriptor.
///
/// Nodes are visited in the order the backend reported them; within a
/// node, groups are visited in the fixed [`OUTPUT_GROUPS`] order.
fn collect_output_files(outputs: &serde_json::Map<String, Value>) -> Vec<OutputFile> {
    let mut files = Vec::new();

    for node_output in outputs.values() {
        for (group, kind) in OUTPUT_GROUPS {
            let Some(entries) = node_output.get(*group).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                let Some(filename) = entry.get("filename").and_then(Value::as_str) else {
                    continue;
                };
                files.push(OutputFile {
                    filename: filename.to_string(),
                    subfolder: entry
                        .get("subfolder")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    file_type: entry
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("output")
                        .to_string(),
                    kind: *kind,
                });
            }
        }
    }

    files
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
