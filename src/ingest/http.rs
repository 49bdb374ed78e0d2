// src/ingest/http.rs
//! Shared outbound HTTP plumbing for source adapters: one client with a
//! bounded per-request timeout, request-target templating, and mapping of
//! transport/status failures into `IngestError::SourceUnavailable`.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::ingest::config::QUERY_PLACEHOLDER;
use crate::ingest::error::IngestError;

/// Build the client every adapter shares. Falls back to a default client if
/// the builder rejects the options (e.g. a malformed user agent).
pub fn build_client(timeout: Duration, user_agent: &str) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .user_agent(user_agent)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(target: "ingest", error = %e, "http client builder failed, using defaults");
            Client::new()
        })
}

/// Form-urlencode a keyword the way search endpoints expect (spaces become `+`).
pub fn encode_query(keyword: &str) -> String {
    urlencoding::encode(keyword).replace("%20", "+")
}

/// Substitute the encoded keyword into every `{query}` placeholder.
pub fn render_target(template: &str, keyword: &str) -> String {
    template.replace(QUERY_PLACEHOLDER, &encode_query(keyword))
}

/// GET `url` and return the body. Timeouts, connection errors and non-2xx
/// statuses all come back as `SourceUnavailable` for `platform`.
pub async fn get_text(client: &Client, platform: &str, url: &str) -> Result<String, IngestError> {
    read_body(platform, client.get(url)).await
}

/// GET authenticated with an `X-Api-Key` header. Non-2xx statuses are
/// returned with their body instead of an error, since keyed JSON APIs put
/// the actual reason (quota, bad key) in the payload.
pub async fn get_with_key(
    client: &Client,
    platform: &str,
    url: &str,
    api_key: &str,
) -> Result<(StatusCode, String), IngestError> {
    let resp = send(platform, client.get(url).header("X-Api-Key", api_key)).await?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| IngestError::unavailable(platform, describe(&e)))?;
    Ok((status, body))
}

async fn send(platform: &str, req: RequestBuilder) -> Result<Response, IngestError> {
    req.send()
        .await
        .map_err(|e| IngestError::unavailable(platform, describe(&e)))
}

async fn read_body(platform: &str, req: RequestBuilder) -> Result<String, IngestError> {
    let resp = send(platform, req).await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(status_error(platform, status));
    }

    resp.text()
        .await
        .map_err(|e| IngestError::unavailable(platform, describe(&e)))
}

pub fn status_error(platform: &str, status: StatusCode) -> IngestError {
    IngestError::unavailable(platform, format!("http status {status}"))
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_is_form_encoded_into_template() {
        let url = render_target("https://x.test/rss?q={query}&hl=en", "pm modi & co");
        assert_eq!(url, "https://x.test/rss?q=pm+modi+%26+co&hl=en");
    }

    #[test]
    fn fixed_feed_template_is_untouched() {
        let url = render_target("https://feeds.example.test/top", "Policy");
        assert_eq!(url, "https://feeds.example.test/top");
    }
}
