// tests/ingest_dedup.rs
mod common;

use chrono::{Duration, Utc};
use common::{rec, temp_store};
use news_intel_ingest::ingest::providers::rss::parse_feed;
use news_intel_ingest::ingest::store::ArticleStore;

#[tokio::test]
async fn persisting_same_record_twice_stores_one_row() {
    let (_dir, store) = temp_store().await;
    let r = rec("https://wire.test/budget-1", "X", "budget");

    assert_eq!(store.persist(&[r.clone()]).await.unwrap(), 1);
    assert_eq!(store.persist(&[r.clone()]).await.unwrap(), 0, "replay is a no-op");
    assert_eq!(store.count_articles().await.unwrap(), 1);
}

#[tokio::test]
async fn replay_across_reopened_store_stays_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("news.db");
    let r = rec("https://wire.test/budget-2", "X", "budget");

    {
        let s = news_intel_ingest::ingest::store::SqliteStore::open(&path).await.unwrap();
        assert_eq!(s.persist(&[r.clone()]).await.unwrap(), 1);
    }
    let s = news_intel_ingest::ingest::store::SqliteStore::open(&path).await.unwrap();
    assert_eq!(s.persist(&[r]).await.unwrap(), 0);
    assert_eq!(s.count_articles().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_of_same_url_create_exactly_one_row() {
    let (_dir, store) = temp_store().await;
    const N: usize = 16;

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                // overlapping batches: shared url plus one url unique to the writer
                let own = format!("https://wire.test/own-{i}");
                let batch = vec![
                    rec("https://wire.test/shared", &format!("P{i}"), "budget"),
                    rec(&own, &format!("P{i}"), "budget"),
                ];
                store.persist(&batch).await.unwrap()
            })
        })
        .collect();

    let mut total = 0;
    for h in handles {
        total += h.await.unwrap();
    }

    assert_eq!(total, N + 1, "N unique urls + the shared one, each counted once");
    assert_eq!(store.count_articles().await.unwrap() as usize, N + 1);
    assert!(store.article_by_url("https://wire.test/shared").await.unwrap().is_some());
}

#[tokio::test]
async fn record_with_unparseable_date_is_stored_with_ingestion_time() {
    let (_dir, store) = temp_store().await;
    let run_start = Utc::now();

    let xml = r#"<rss version="2.0"><channel><title>Wire</title>
        <item><title>Odd date</title><link>https://wire.test/odd</link>
        <pubDate>32 Smarch 20X4</pubDate></item>
        </channel></rss>"#;
    let recs = parse_feed("X", "budget", xml, Utc::now()).unwrap();
    assert_eq!(store.persist(&recs).await.unwrap(), 1);

    let row = store.article_by_url("https://wire.test/odd").await.unwrap().unwrap();
    assert!(row.published_at >= run_start - Duration::milliseconds(1));
    assert!(row.fetched_at >= row.published_at - Duration::seconds(1));
    assert_eq!(row.platform, "X");
    assert_eq!(row.keyword, "budget");
}
