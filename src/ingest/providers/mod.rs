// src/ingest/providers/mod.rs
pub mod newsapi;
pub mod rss;

use std::sync::Arc;

use reqwest::Client;

use crate::ingest::config::IngestConfig;
use crate::ingest::types::SourceAdapter;

use self::newsapi::NewsApiAdapter;
use self::rss::RssAdapter;

/// One feed adapter per configured platform, in configured order.
pub fn build_platform_adapters(cfg: &IngestConfig, client: &Client) -> Vec<Arc<dyn SourceAdapter>> {
    cfg.sources
        .iter()
        .map(|s| Arc::new(RssAdapter::new(s, client.clone())) as Arc<dyn SourceAdapter>)
        .collect()
}

/// The keyed secondary source, if a credential is present.
pub fn build_secondary_adapter(cfg: &IngestConfig, client: &Client) -> Option<Arc<dyn SourceAdapter>> {
    let adapter = NewsApiAdapter::from_key(
        cfg.newsapi_key.as_deref(),
        cfg.newsapi_page_size,
        client.clone(),
    );
    if adapter.is_none() {
        tracing::info!(target: "ingest", "NEWSAPI_KEY not set, secondary source disabled");
    }
    adapter.map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
}
