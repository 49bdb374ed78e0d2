// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::error::IngestError;

/// One discovered article, normalized from whatever the source returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub title: String,       // HTML-stripped, never empty
    pub description: String, // HTML-stripped, may be empty
    pub url: String,         // identity key
    pub source_name: String, // publisher label, e.g. "Reuters"
    pub platform: String,    // adapter that produced it, e.g. "Google News"
    pub keyword: String,
    pub published_at: DateTime<Utc>,
    pub author: String,
}

/// A persisted article row. Created at most once per distinct `url`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredArticle {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub url: String,
    pub source_name: String,
    pub platform: String,
    pub keyword: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub author: String,
    /// Filled by downstream enrichment, never by ingestion.
    pub sentiment: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Ok,
    Error,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchStatus::Ok => "ok",
            FetchStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for FetchStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(FetchStatus::Ok),
            "error" => Ok(FetchStatus::Error),
            other => Err(IngestError::Config(format!("unknown fetch status '{other}'"))),
        }
    }
}

/// Append-only audit record: one per (platform, keyword) attempt per run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FetchLogEntry {
    pub platform: String,
    pub keyword: String,
    pub status: FetchStatus,
    pub count: usize, // records accepted from the source in that attempt
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

impl FetchLogEntry {
    pub fn ok(platform: &str, keyword: &str, count: usize) -> Self {
        Self {
            platform: platform.to_string(),
            keyword: keyword.to_string(),
            status: FetchStatus::Ok,
            count,
            message: String::new(),
            logged_at: Utc::now(),
        }
    }

    pub fn error(platform: &str, keyword: &str, message: impl Into<String>) -> Self {
        Self {
            platform: platform.to_string(),
            keyword: keyword.to_string(),
            status: FetchStatus::Error,
            count: 0,
            message: message.into(),
            logged_at: Utc::now(),
        }
    }
}

/// One external feed. Implementations own request building, timeouts and
/// format parsing; errors stay inside the returned `Result` and never
/// unwind past the adapter.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, keyword: &str) -> Result<Vec<CanonicalRecord>, IngestError>;

    /// Platform label written into records and ledger entries.
    fn platform(&self) -> &str;

    /// Rate-limit class. Adapters hitting the same host share a class.
    fn source_class(&self) -> &str {
        self.platform()
    }
}
