/// Opaque job identifier, assigned by the producer at creation time.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
