// src/ingest/error.rs
use thiserror::Error;

/// Failures below the scheduler boundary. None of these stop a run: the
/// orchestrator logs them to the ledger and moves on to the next pair.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Network error, timeout or non-2xx status from a source.
    #[error("{platform} unavailable: {reason}")]
    SourceUnavailable { platform: String, reason: String },

    /// Payload could not be decoded into feed entries.
    #[error("{platform} returned a malformed payload: {reason}")]
    Parse { platform: String, reason: String },

    /// Durable store unreachable or write rejected (duplicates never land here).
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn unavailable(platform: &str, reason: impl ToString) -> Self {
        IngestError::SourceUnavailable {
            platform: platform.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(platform: &str, reason: impl ToString) -> Self {
        IngestError::Parse {
            platform: platform.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short label used in metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::SourceUnavailable { .. } => "source_unavailable",
            IngestError::Parse { .. } => "parse",
            IngestError::Storage(_) => "storage",
            IngestError::Config(_) => "config",
        }
    }
}
