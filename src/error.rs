use thiserror::Error;

/// Errors that can occur in the ingestion and aggregation pipeline.
///
/// `Request`/`Parse` are terminal for a single fetch attempt (the next
/// scheduled tick is the retry mechanism). `Storage` is logged by the bus and
/// never blocks sibling handlers. `ConsistencyViolation` aborts a verify-mode
/// audit run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("request to `{source_id}` failed: {reason}")]
    Request { source_id: String, reason: String },

    #[error("bad response body from `{source_id}`: {reason}")]
    Parse { source_id: String, reason: String },

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("statistics for `{source_id}` disagree on `{field}`: log has {expected}, cache has {actual}")]
    ConsistencyViolation {
        source_id: String,
        field: &'static str,
        expected: String,
        actual: String,
    },
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

// A cache entry that no longer decodes is a broken store, not a bad fetch.
impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}
