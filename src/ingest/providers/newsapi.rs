// src/ingest/providers/newsapi.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::ingest::error::IngestError;
use crate::ingest::http::{encode_query, get_with_key, status_error};
use crate::ingest::types::{CanonicalRecord, SourceAdapter};
use crate::ingest::{normalize_text, parse_published};

pub const NEWSAPI_PLATFORM: &str = "NewsAPI";
pub const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2";

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    source: Option<ArticleSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// Keyed aggregator queried once per keyword on top of the feed platforms.
/// Only constructed when a credential is configured.
pub struct NewsApiAdapter {
    api_key: String,
    base_url: String,
    page_size: u32,
    client: Client,
}

impl NewsApiAdapter {
    pub fn new(api_key: String, page_size: u32, client: Client) -> Self {
        Self {
            api_key,
            base_url: NEWSAPI_BASE_URL.to_string(),
            page_size,
            client,
        }
    }

    /// `None` when no key is set: a missing credential means "skip", not "fail".
    pub fn from_key(api_key: Option<&str>, page_size: u32, client: Client) -> Option<Self> {
        api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Self::new(k.to_string(), page_size, client))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn target_for(&self, keyword: &str) -> String {
        format!(
            "{}/everything?q={}&language=en&sortBy=publishedAt&pageSize={}",
            self.base_url,
            encode_query(keyword),
            self.page_size
        )
    }
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
    async fn fetch(&self, keyword: &str) -> Result<Vec<CanonicalRecord>, IngestError> {
        let url = self.target_for(keyword);
        // Key travels in a header so it never shows up in logged urls.
        let (status, body) = get_with_key(&self.client, NEWSAPI_PLATFORM, &url, &self.api_key).await?;
        interpret(status, keyword, &body, Utc::now())
    }

    fn platform(&self) -> &str {
        NEWSAPI_PLATFORM
    }
}

/// NewsAPI answers failures (401, 426, 429, ...) with a non-2xx status and a
/// `{status, code, message}` body. Surface that message when the body has
/// one, else fall back to the bare status.
pub fn interpret(
    status: StatusCode,
    keyword: &str,
    body: &str,
    now: DateTime<Utc>,
) -> Result<Vec<CanonicalRecord>, IngestError> {
    match parse_response(keyword, body, now) {
        Ok(records) if status.is_success() => Ok(records),
        Err(e @ IngestError::SourceUnavailable { .. }) => Err(e),
        Ok(_) | Err(_) if !status.is_success() => Err(status_error(NEWSAPI_PLATFORM, status)),
        other => other,
    }
}

/// Decode a `/v2/everything` payload. Removed/untitled articles are dropped.
pub fn parse_response(
    keyword: &str,
    body: &str,
    now: DateTime<Utc>,
) -> Result<Vec<CanonicalRecord>, IngestError> {
    let resp: NewsApiResponse =
        serde_json::from_str(body).map_err(|e| IngestError::parse(NEWSAPI_PLATFORM, e))?;

    if resp.status != "ok" {
        let code = resp.code.unwrap_or_else(|| "unknown".to_string());
        let message = resp.message.unwrap_or_else(|| "no message".to_string());
        return Err(IngestError::unavailable(
            NEWSAPI_PLATFORM,
            format!("api error {code}: {message}"),
        ));
    }

    let mut out = Vec::with_capacity(resp.articles.len());
    for a in resp.articles {
        let title = normalize_text(a.title.as_deref().unwrap_or_default());
        let url = a.url.as_deref().map(str::trim).unwrap_or_default().to_string();
        if title.is_empty() || title == "[Removed]" || url.is_empty() {
            continue;
        }
        out.push(CanonicalRecord {
            title,
            description: normalize_text(a.description.as_deref().unwrap_or_default()),
            url,
            source_name: a
                .source
                .and_then(|s| s.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| NEWSAPI_PLATFORM.to_string()),
            platform: NEWSAPI_PLATFORM.to_string(),
            keyword: keyword.to_string(),
            published_at: parse_published(a.published_at.as_deref(), now),
            author: normalize_text(a.author.as_deref().unwrap_or_default()),
        });
    }

    counter!("ingest_records_fetched_total").increment(out.len() as u64);
    Ok(out)
}
