// src/ingest/mod.rs
pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod providers;
pub mod rate_limit;
pub mod scheduler;
pub mod store;
pub mod types;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

pub use error::IngestError;
pub use types::{CanonicalRecord, FetchLogEntry, FetchStatus, SourceAdapter, StoredArticle};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Completed ingestion runs.");
        describe_counter!(
            "ingest_runs_skipped_total",
            "Triggers dropped because a run was already in flight."
        );
        describe_counter!(
            "ingest_fetch_attempts_total",
            "Adapter invocations, one per (platform, keyword) pair."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_counter!(
            "ingest_storage_errors_total",
            "Batches rejected by the article store."
        );
        describe_counter!(
            "ingest_records_fetched_total",
            "Canonical records returned by adapters."
        );
        describe_counter!(
            "ingest_records_stored_total",
            "Articles newly persisted (duplicates excluded)."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when ingest pipeline last ran."
        );
    });
}

/// Normalize free text from a feed: decode entities, strip markup, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode (feeds often double-encode markup inside descriptions)
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 2000 chars
    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }

    out
}

/// Best-effort timestamp parsing. Tries RFC 2822 (RSS), RFC 3339 (Atom, JSON APIs)
/// and a bare ISO datetime; anything else resolves to `fallback`.
pub fn parse_published(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(ts) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback;
    };

    let via_time = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .and_then(|dt| {
            Utc.timestamp_opt(dt.unix_timestamp(), dt.nanosecond())
                .single()
        });
    if let Some(dt) = via_time {
        return dt;
    }

    // chrono is more lenient with obsolete zone names ("GMT", "EST")
    if let Ok(dt) = DateTime::parse_from_rfc2822(ts) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc();
    }

    tracing::debug!(target: "ingest", raw = ts, "unparseable publish date, using ingestion time");
    fallback
}
