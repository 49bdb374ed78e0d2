// src/lib.rs
// Public library surface for integration tests and the binary.

pub mod api;
pub mod ingest;
pub mod metrics;

pub use crate::api::router;
pub use crate::ingest::orchestrator::{Orchestrator, RunSummary};
pub use crate::ingest::scheduler::{Scheduler, TriggerStatus};

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::ingest::config::IngestConfig;
use crate::ingest::http::build_client;
use crate::ingest::providers::{build_platform_adapters, build_secondary_adapter};
use crate::ingest::rate_limit::RateLimiter;
use crate::ingest::store::SqliteStore;

/// Everything a host needs to run ingestion, wired from one config.
pub struct IngestRuntime {
    pub config: IngestConfig,
    pub store: Arc<SqliteStore>,
    pub scheduler: Scheduler,
}

impl IngestRuntime {
    /// Open the store and build adapters + scheduler. Only a store that cannot
    /// be opened is fatal; a missing NewsAPI key just disables that source.
    pub async fn bootstrap(config: IngestConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.db_path).await?);

        let client = build_client(config.request_timeout(), &config.user_agent);
        let sources = build_platform_adapters(&config, &client);
        let secondary = build_secondary_adapter(&config, &client);

        let orchestrator = Orchestrator::new(
            sources,
            store.clone(),
            Arc::new(RateLimiter::new(config.min_request_interval())),
        )
        .with_secondary(secondary)
        .with_max_concurrency(config.max_concurrency)
        .with_fetch_timeout(config.request_timeout() * 2);

        let scheduler = Scheduler::new(orchestrator, config.keywords.clone());
        info!(
            keywords = config.keywords.len(),
            platforms = ?scheduler.platforms(),
            interval_secs = config.interval_secs,
            "ingest runtime ready"
        );

        Ok(Self {
            config,
            store,
            scheduler,
        })
    }

    /// Start the periodic loop (runs once immediately).
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.scheduler.spawn(self.config.interval())
    }

    pub fn app_state(&self) -> api::AppState {
        api::AppState {
            scheduler: self.scheduler.clone(),
        }
    }
}
