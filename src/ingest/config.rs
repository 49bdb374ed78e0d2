// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";
pub const ENV_DB_PATH: &str = "INGEST_DB_PATH";
pub const ENV_INTERVAL_SECS: &str = "INGEST_INTERVAL_SECS";
pub const ENV_NEWSAPI_KEY: &str = "NEWSAPI_KEY";

pub const DEFAULT_CONFIG_TOML: &str = "config/ingest.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/ingest.json";

pub const QUERY_PLACEHOLDER: &str = "{query}";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36";

fn default_keywords() -> Vec<String> {
    [
        "politics modi",
        "pm modi",
        "rahul gandhi",
        "Parliament",
        "Policy",
        "Government",
        "Human Rights",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_sources() -> Vec<SourceCfg> {
    [
        (
            "Google News",
            "https://news.google.com/rss/search?q={query}&hl=en-IN&gl=IN&ceid=IN:en",
        ),
        ("Yahoo News", "https://news.yahoo.com/rss/search?p={query}"),
        (
            "Bing News",
            "https://www.bing.com/news/search?q={query}&format=rss",
        ),
        (
            "DuckDuckGo",
            "https://duckduckgo.com/?q={query}&iar=news&format=rss",
        ),
        (
            "Opera News",
            "https://news.google.com/rss/search?q={query}&hl=en&gl=US&ceid=US:en",
        ),
        ("Reuters", "https://feeds.reuters.com/reuters/INtopNews"),
    ]
    .into_iter()
    .map(|(name, url)| SourceCfg {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}

fn default_interval_secs() -> u64 {
    6 * 3600
}
fn default_min_request_interval_ms() -> u64 {
    500
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_max_concurrency() -> usize {
    4
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/news_dashboard.db")
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_newsapi_page_size() -> u32 {
    20
}

/// One feed endpoint: display name + request target with a `{query}` placeholder.
/// A target without the placeholder is a fixed feed; the keyword is then only a label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCfg {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceCfg>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_newsapi_page_size")]
    pub newsapi_page_size: u32,
    /// Never read from files; only from `$NEWSAPI_KEY`.
    #[serde(skip)]
    pub newsapi_key: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            sources: default_sources(),
            interval_secs: default_interval_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            newsapi_page_size: default_newsapi_page_size(),
            newsapi_key: None,
        }
    }
}

impl IngestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Names of the per-platform sources, in configured order.
    pub fn platform_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }

    /// Trim and de-duplicate lists, clamp numeric knobs to usable values.
    fn sanitize(mut self) -> Result<Self> {
        self.keywords = clean_list(self.keywords);

        let mut seen = std::collections::HashSet::new();
        let mut sources = Vec::with_capacity(self.sources.len());
        for mut s in self.sources {
            s.name = s.name.trim().to_string();
            s.url = s.url.trim().to_string();
            if s.name.is_empty() || s.url.is_empty() {
                continue;
            }
            if !s.url.starts_with("http://") && !s.url.starts_with("https://") {
                return Err(anyhow!("source '{}' has a non-http url: {}", s.name, s.url));
            }
            if seen.insert(s.name.to_ascii_lowercase()) {
                sources.push(s);
            }
        }
        self.sources = sources;

        self.interval_secs = self.interval_secs.max(1);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.max_concurrency = self.max_concurrency.max(1);
        self.newsapi_page_size = self.newsapi_page_size.clamp(1, 100);
        Ok(self)
    }

    /// Apply `$INGEST_DB_PATH`, `$INGEST_INTERVAL_SECS` and the optional `$NEWSAPI_KEY`.
    fn apply_env(mut self) -> Self {
        if let Ok(p) = std::env::var(ENV_DB_PATH) {
            if !p.trim().is_empty() {
                self.db_path = PathBuf::from(p.trim());
            }
        }
        if let Some(secs) = std::env::var(ENV_INTERVAL_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.interval_secs = secs.max(1);
        }
        // Missing credential is not an error: the keyed source is simply skipped.
        self.newsapi_key = std::env::var(ENV_NEWSAPI_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing ingest config {}", path.display()))?;
    Ok(cfg.apply_env())
}

/// Load config using env var + fallbacks:
/// 1) $INGEST_CONFIG_PATH
/// 2) config/ingest.toml
/// 3) config/ingest.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("INGEST_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_CONFIG_TOML);
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_CONFIG_JSON);
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(IngestConfig::default().sanitize()?.apply_env())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    let parsed = if hint_ext == "json" {
        serde_json::from_str::<IngestConfig>(s).map_err(anyhow::Error::from)
    } else if hint_ext == "toml" {
        toml::from_str::<IngestConfig>(s).map_err(anyhow::Error::from)
    } else {
        // No hint: JSON objects start with '{', everything else is tried as TOML.
        if s.trim_start().starts_with('{') {
            serde_json::from_str::<IngestConfig>(s).map_err(anyhow::Error::from)
        } else {
            toml::from_str::<IngestConfig>(s).map_err(anyhow::Error::from)
        }
    };
    parsed?.sanitize()
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}
