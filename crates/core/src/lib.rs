//! Dependency-light domain logic shared by every mediamill crate.
//!
//! Holds the shared type aliases, the core error enum, media filename
//! classification, and generation parameter validation. Nothing in this
//! crate performs I/O.

pub mod error;
pub mod media;
pub mod params;
pub mod types;

pub use error::CoreError;
