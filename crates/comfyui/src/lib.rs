//! ComfyUI Generation Backend client.
//!
//! This crate is the boundary to the external, slow, asynchronous
//! generation service:
//!
//! - [`ComfyApi`] - reqwest client for the ComfyUI REST endpoints
//!   (workflow submission, history retrieval, image upload, output
//!   download, reachability probe).
//! - [`history`] - interprets a raw history document into a typed
//!   [`RunState`] with ordered [`OutputFile`] descriptors.
//! - [`workflow`] - placeholder substitution on workflow templates.

pub mod api;
pub mod history;
pub mod workflow;

pub use api::{ComfyApi, ComfyApiError};
pub use history::{interpret_history, OutputFile, OutputKind, RunState};
