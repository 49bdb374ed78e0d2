// src/ingest/orchestrator.rs
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::ingest::ensure_metrics_described;
use crate::ingest::error::IngestError;
use crate::ingest::rate_limit::RateLimiter;
use crate::ingest::store::ArticleStore;
use crate::ingest::types::{FetchLogEntry, SourceAdapter};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Outcome of one pass over all (keyword, source) pairs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// keyword -> newly stored articles
    pub per_keyword: BTreeMap<String, usize>,
    /// Pairs never started because the run deadline passed.
    pub abandoned: usize,
}

impl RunSummary {
    pub fn total_new(&self) -> usize {
        self.per_keyword.values().sum()
    }
}

enum Attempt {
    Done(usize),
    Abandoned,
}

/// Fans a run out across keywords x sources. Holds no per-run state, so
/// overlapping calls each get their own accumulators.
pub struct Orchestrator {
    sources: Vec<Arc<dyn SourceAdapter>>,
    secondary: Option<Arc<dyn SourceAdapter>>,
    store: Arc<dyn ArticleStore>,
    limiter: Arc<RateLimiter>,
    max_concurrency: usize,
    fetch_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        sources: Vec<Arc<dyn SourceAdapter>>,
        store: Arc<dyn ArticleStore>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            sources,
            secondary: None,
            store,
            limiter,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Optional keyed source queried once per keyword after the platforms.
    pub fn with_secondary(mut self, secondary: Option<Arc<dyn SourceAdapter>>) -> Self {
        self.secondary = secondary;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Upper bound on a single adapter call, on top of the HTTP client's own timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Platform labels in query order (secondary last).
    pub fn platforms(&self) -> Vec<String> {
        self.adapters().map(|a| a.platform().to_string()).collect()
    }

    fn adapters(&self) -> impl Iterator<Item = &Arc<dyn SourceAdapter>> {
        self.sources.iter().chain(self.secondary.iter())
    }

    /// Run every (keyword, source) pair to completion.
    pub async fn run_once(&self, keywords: &[String]) -> RunSummary {
        self.run_until(keywords, None).await
    }

    /// Like [`run_once`](Self::run_once), but pairs not yet started when
    /// `deadline` passes are skipped. Finished pairs keep their outcome.
    pub async fn run_until(&self, keywords: &[String], deadline: Option<Instant>) -> RunSummary {
        ensure_metrics_described();
        let started_at = Utc::now();
        let mut per_keyword: BTreeMap<String, usize> = BTreeMap::new();
        let mut abandoned = 0usize;

        for keyword in keywords {
            let mut attempts = Vec::new();
            for adapter in self.adapters() {
                attempts.push(self.attempt(adapter.as_ref(), keyword, deadline));
            }
            let outcomes: Vec<Attempt> = stream::iter(attempts)
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;

            let mut stored = 0usize;
            for o in outcomes {
                match o {
                    Attempt::Done(n) => stored += n,
                    Attempt::Abandoned => abandoned += 1,
                }
            }
            *per_keyword.entry(keyword.clone()).or_default() += stored;
            info!(target: "ingest", %keyword, stored, "keyword done");
        }

        let finished_at = Utc::now();
        counter!("ingest_runs_total").increment(1);
        gauge!("ingest_pipeline_last_run_ts").set(finished_at.timestamp() as f64);

        let summary = RunSummary {
            started_at,
            finished_at,
            per_keyword,
            abandoned,
        };
        info!(
            target: "ingest",
            total_new = summary.total_new(),
            keywords = summary.per_keyword.len(),
            abandoned,
            "run finished"
        );
        summary
    }

    /// One (platform, keyword) attempt: throttle, fetch, persist, then ledger.
    /// Every failure stays here; the caller only sees a count.
    async fn attempt(
        &self,
        adapter: &dyn SourceAdapter,
        keyword: &str,
        deadline: Option<Instant>,
    ) -> Attempt {
        let platform = adapter.platform();
        self.limiter.throttle(adapter.source_class()).await;
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Attempt::Abandoned;
        }
        counter!("ingest_fetch_attempts_total").increment(1);

        let fetched = match tokio::time::timeout(self.fetch_timeout, adapter.fetch(keyword)).await {
            Ok(res) => res,
            Err(_) => Err(IngestError::unavailable(
                platform,
                format!("no response within {:?}", self.fetch_timeout),
            )),
        };

        let (entry, stored) = match fetched {
            Ok(records) => match self.store.persist(&records).await {
                Ok(new) => {
                    info!(target: "ingest", platform, keyword, fetched = records.len(), new, "source ok");
                    counter!("ingest_records_stored_total").increment(new as u64);
                    (FetchLogEntry::ok(platform, keyword, records.len()), new)
                }
                Err(e) => {
                    warn!(target: "ingest", platform, keyword, error = %e, "batch not persisted");
                    counter!("ingest_storage_errors_total").increment(1);
                    (FetchLogEntry::error(platform, keyword, e.to_string()), 0)
                }
            },
            Err(e) => {
                warn!(target: "ingest", platform, keyword, kind = e.kind(), error = %e, "source failed");
                counter!("ingest_provider_errors_total").increment(1);
                (FetchLogEntry::error(platform, keyword, e.to_string()), 0)
            }
        };

        // Appended only after persist returned, so an "ok" entry is always backed by stored rows.
        if let Err(e) = self.store.append_log(&entry).await {
            warn!(target: "ingest", platform, keyword, error = %e, "fetch ledger append failed");
        }
        Attempt::Done(stored)
    }
}
