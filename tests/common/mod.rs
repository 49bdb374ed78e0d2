// tests/common/mod.rs
// Shared test doubles: scripted adapters and an in-memory store.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use news_intel_ingest::ingest::store::{ArticleStore, SqliteStore};
use news_intel_ingest::ingest::{CanonicalRecord, FetchLogEntry, IngestError, SourceAdapter};
use tokio::sync::Semaphore;

pub fn rec(url: &str, platform: &str, keyword: &str) -> CanonicalRecord {
    CanonicalRecord {
        title: format!("Headline for {url}"),
        description: String::new(),
        url: url.to_string(),
        source_name: "Test Wire".to_string(),
        platform: platform.to_string(),
        keyword: keyword.to_string(),
        published_at: Utc::now(),
        author: String::new(),
    }
}

pub async fn temp_store() -> (tempfile::TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("news.db"))
        .await
        .expect("open store");
    (dir, Arc::new(store))
}

pub enum Behavior {
    Records(Vec<&'static str>),
    Fail(&'static str),
    Hang,
}

/// Adapter with scripted output; counts its invocations.
pub struct ScriptedAdapter {
    platform: String,
    behavior: Behavior,
    gate: Option<Arc<Semaphore>>,
    pub calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(platform: &str, behavior: Behavior) -> Self {
        Self {
            platform: platform.to_string(),
            behavior,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Each fetch waits for one permit on `gate` before answering.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    async fn fetch(&self, keyword: &str) -> Result<Vec<CanonicalRecord>, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        match &self.behavior {
            Behavior::Records(urls) => Ok(urls
                .iter()
                .map(|u| rec(u, &self.platform, keyword))
                .collect()),
            Behavior::Fail(reason) => Err(IngestError::unavailable(&self.platform, reason)),
            Behavior::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn platform(&self) -> &str {
        &self.platform
    }
}

/// In-memory store with url-keyed first-write-wins semantics.
/// `fail_persist_for` makes every batch from that platform a storage failure.
#[derive(Default)]
pub struct MemoryStore {
    pub articles: Mutex<HashMap<String, CanonicalRecord>>,
    pub logs: Mutex<Vec<FetchLogEntry>>,
    pub fail_persist_for: Option<String>,
    pub fail_logs: bool,
}

impl MemoryStore {
    pub fn logs(&self) -> Vec<FetchLogEntry> {
        self.logs.lock().unwrap().clone()
    }

    pub fn article_count(&self) -> usize {
        self.articles.lock().unwrap().len()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn persist(&self, batch: &[CanonicalRecord]) -> Result<usize, IngestError> {
        if let Some(p) = &self.fail_persist_for {
            if batch.iter().any(|r| &r.platform == p) {
                return Err(IngestError::Storage(sqlx::Error::PoolTimedOut));
            }
        }
        let mut map = self.articles.lock().unwrap();
        let mut inserted = 0;
        for r in batch {
            if !map.contains_key(&r.url) {
                map.insert(r.url.clone(), r.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn append_log(&self, entry: &FetchLogEntry) -> Result<(), IngestError> {
        if self.fail_logs {
            return Err(IngestError::Storage(sqlx::Error::PoolClosed));
        }
        self.logs.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
