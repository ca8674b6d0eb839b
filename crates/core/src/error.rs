//! Core error type shared by the pure domain-logic modules.

/// Errors produced by core validation and domain logic.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A request parameter is malformed or out of range.
    #[error("Validation error: {0}")]
    Validation(String),
}
