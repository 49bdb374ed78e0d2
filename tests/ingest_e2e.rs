// tests/ingest_e2e.rs
//
// End-to-end over real HTTP: a loopback axum server plays the feed sources,
// the real adapters fetch and parse, and a temp SQLite file is the store.

mod common;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use common::temp_store;
use news_intel_ingest::ingest::config::{IngestConfig, SourceCfg};
use news_intel_ingest::ingest::http::build_client;
use news_intel_ingest::ingest::providers::newsapi::NewsApiAdapter;
use news_intel_ingest::ingest::providers::rss::RssAdapter;
use news_intel_ingest::ingest::rate_limit::RateLimiter;
use news_intel_ingest::ingest::{FetchStatus, SourceAdapter};
use news_intel_ingest::{IngestRuntime, Orchestrator};

const X_XML: &str = include_str!("fixtures/x_budget.xml");
const Y_XML: &str = include_str!("fixtures/y_budget.xml");
const NEWSAPI_JSON: &str = include_str!("fixtures/newsapi_budget.json");
const NEWSAPI_RATE_LIMITED: &str = r#"{"status":"error","code":"rateLimited","message":"You have made too many requests recently."}"#;

type Seen = Arc<Mutex<Vec<String>>>;

fn rss(body: &'static str) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/rss+xml")], body)
}

async fn serve_feeds() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route(
            "/x",
            get(|State(seen): State<Seen>, Query(q): Query<HashMap<String, String>>| async move {
                seen.lock().unwrap().push(q.get("q").cloned().unwrap_or_default());
                rss(X_XML)
            }),
        )
        .route("/y", get(|| async { rss(Y_XML) }))
        .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route(
            "/v2/everything",
            get(|headers: HeaderMap| async move {
                match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
                    Some("test-key") => (StatusCode::OK, NEWSAPI_JSON).into_response(),
                    Some("busy-key") => (
                        StatusCode::TOO_MANY_REQUESTS,
                        [(header::CONTENT_TYPE, "application/json")],
                        NEWSAPI_RATE_LIMITED,
                    )
                        .into_response(),
                    _ => StatusCode::UNAUTHORIZED.into_response(),
                }
            }),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

fn source(name: &str, url: String) -> SourceCfg {
    SourceCfg {
        name: name.to_string(),
        url,
    }
}

#[tokio::test]
async fn two_sources_with_one_shared_url_store_four() {
    let (addr, seen) = serve_feeds().await;
    let dir = tempfile::tempdir().unwrap();

    let config = IngestConfig {
        keywords: vec!["budget".to_string()],
        sources: vec![
            source("X", format!("http://{addr}/x?q={{query}}")),
            source("Y", format!("http://{addr}/y?q={{query}}")),
        ],
        min_request_interval_ms: 10,
        request_timeout_secs: 5,
        db_path: dir.path().join("data/news.db"),
        ..IngestConfig::default()
    };
    let runtime = IngestRuntime::bootstrap(config).await.unwrap();

    let summary = runtime.scheduler.run_now().await.expect("idle scheduler runs");
    assert_eq!(summary.per_keyword.len(), 1);
    assert_eq!(summary.per_keyword.get("budget"), Some(&4));
    assert_eq!(runtime.store.count_articles().await.unwrap(), 4);

    let mut ledger: Vec<_> = runtime
        .store
        .fetch_logs()
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.platform, e.keyword, e.status, e.count))
        .collect();
    ledger.sort();
    assert_eq!(
        ledger,
        vec![
            ("X".to_string(), "budget".to_string(), FetchStatus::Ok, 3),
            ("Y".to_string(), "budget".to_string(), FetchStatus::Ok, 2),
        ]
    );

    assert_eq!(*seen.lock().unwrap(), vec!["budget".to_string()]);

    let row = runtime
        .store
        .article_by_url("https://news.example.test/budget/opposition")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.description, r#"Leaders called the plan "cosmetic"."#);
    assert_eq!(row.source_name, "X Wire - budget");
}

#[tokio::test]
async fn dead_source_and_keyed_secondary_in_one_run() {
    let (addr, seen) = serve_feeds().await;
    let (_dir, store) = temp_store().await;
    let client = build_client(Duration::from_secs(5), "news-intel-ingest-test");

    let sources: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(RssAdapter::new(&source("X", format!("http://{addr}/x?q={{query}}")), client.clone())),
        Arc::new(RssAdapter::new(&source("Down", format!("http://{addr}/down?q={{query}}")), client.clone())),
    ];
    let newsapi = NewsApiAdapter::new("test-key".into(), 20, client.clone())
        .with_base_url(format!("http://{addr}/v2"));
    let orch = Orchestrator::new(sources, store.clone(), Arc::new(RateLimiter::new(Duration::from_millis(5))))
        .with_secondary(Some(Arc::new(newsapi) as Arc<dyn SourceAdapter>));

    let summary = orch.run_once(&["pm modi".to_string()]).await;
    // X: 3 new; NewsAPI: 2 entries, one already seen via X
    assert_eq!(summary.per_keyword.get("pm modi"), Some(&4));
    assert_eq!(*seen.lock().unwrap(), vec!["pm modi".to_string()]);

    let logs = store.fetch_logs().await.unwrap();
    assert_eq!(logs.len(), 3);
    let down = logs.iter().find(|e| e.platform == "Down").unwrap();
    assert_eq!(down.status, FetchStatus::Error);
    assert!(down.message.contains("503"), "{}", down.message);
    let api = logs.iter().find(|e| e.platform == "NewsAPI").unwrap();
    assert_eq!((api.status, api.count), (FetchStatus::Ok, 2));
}

#[tokio::test]
async fn wrong_api_key_is_logged_not_fatal() {
    let (addr, _seen) = serve_feeds().await;
    let (_dir, store) = temp_store().await;
    let client = build_client(Duration::from_secs(5), "news-intel-ingest-test");

    let newsapi = NewsApiAdapter::new("wrong".into(), 20, client).with_base_url(format!("http://{addr}/v2"));
    let orch = Orchestrator::new(Vec::new(), store.clone(), Arc::new(RateLimiter::new(Duration::ZERO)))
        .with_secondary(Some(Arc::new(newsapi) as Arc<dyn SourceAdapter>));

    let summary = orch.run_once(&["budget".to_string()]).await;
    assert_eq!(summary.total_new(), 0);

    let logs = store.fetch_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, FetchStatus::Error);
    assert!(logs[0].message.contains("401"), "{}", logs[0].message);
}

#[tokio::test]
async fn rate_limited_api_message_reaches_the_ledger() {
    let (addr, _seen) = serve_feeds().await;
    let (_dir, store) = temp_store().await;
    let client = build_client(Duration::from_secs(5), "news-intel-ingest-test");

    let newsapi = NewsApiAdapter::new("busy-key".into(), 20, client).with_base_url(format!("http://{addr}/v2"));
    let orch = Orchestrator::new(Vec::new(), store.clone(), Arc::new(RateLimiter::new(Duration::ZERO)))
        .with_secondary(Some(Arc::new(newsapi) as Arc<dyn SourceAdapter>));

    orch.run_once(&["budget".to_string()]).await;

    let logs = store.fetch_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!((logs[0].status, logs[0].count), (FetchStatus::Error, 0));
    assert!(logs[0].message.contains("rateLimited"), "{}", logs[0].message);
    assert!(
        logs[0].message.contains("You have made too many requests recently."),
        "{}",
        logs[0].message
    );
}
