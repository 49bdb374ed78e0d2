// src/ingest/store.rs
//! Durable article store + append-only fetch ledger (SQLite via sqlx).
//!
//! Uniqueness of `articles.url` is enforced by the schema; inserts use
//! `ON CONFLICT(url) DO NOTHING`, so concurrent or replayed writers converge
//! on a single row without any check-then-insert in caller code.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::ingest::error::IngestError;
use crate::ingest::types::{CanonicalRecord, FetchLogEntry, StoredArticle};

/// Persistence seam used by the orchestrator.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Persist a batch; returns how many rows were newly created.
    /// Already-seen urls are silent no-ops. Only genuine storage faults error,
    /// and then nothing from this batch is kept.
    async fn persist(&self, batch: &[CanonicalRecord]) -> Result<usize, IngestError>;

    /// Append one ledger entry. Independent of any `persist` outcome.
    async fn append_log(&self, entry: &FetchLogEntry) -> Result<(), IngestError>;
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        title        TEXT NOT NULL,
        description  TEXT NOT NULL DEFAULT '',
        url          TEXT NOT NULL UNIQUE,
        source_name  TEXT NOT NULL DEFAULT '',
        platform     TEXT NOT NULL,
        keyword      TEXT NOT NULL,
        published_at TEXT NOT NULL,
        fetched_at   TEXT NOT NULL,
        author       TEXT NOT NULL DEFAULT '',
        sentiment    REAL NOT NULL DEFAULT 0.0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_keyword   ON articles(keyword)",
    "CREATE INDEX IF NOT EXISTS idx_platform  ON articles(platform)",
    "CREATE INDEX IF NOT EXISTS idx_published ON articles(published_at)",
    r#"
    CREATE TABLE IF NOT EXISTS fetch_logs (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        platform  TEXT NOT NULL,
        keyword   TEXT NOT NULL,
        status    TEXT NOT NULL,
        count     INTEGER NOT NULL DEFAULT 0,
        message   TEXT NOT NULL DEFAULT '',
        logged_at TEXT NOT NULL
    )
    "#,
];

type LogRow = (String, String, String, i64, String, DateTime<Utc>);

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    // Serializes batch transactions from this process; SQLite's own lock
    // still covers other processes via busy_timeout.
    write_gate: std::sync::Arc<tokio::sync::Mutex<()>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and run migrations.
    /// Failure here is the one fatal setup error of a run.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating store directory {}", dir.display()))?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .with_context(|| format!("opening sqlite store at {}", path.display()))?;

        let store = Self {
            pool,
            write_gate: Default::default(),
        };
        store.migrate().await.context("migrating sqlite store")?;
        tracing::info!(target: "ingest", path = %path.display(), "article store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn count_articles(&self) -> Result<i64, IngestError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn article_by_url(&self, url: &str) -> Result<Option<StoredArticle>, IngestError> {
        let row = sqlx::query_as::<_, StoredArticle>(
            r#"
            SELECT id, title, description, url, source_name, platform, keyword,
                   published_at, fetched_at, author, sentiment
            FROM articles WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Most recently stored first.
    pub async fn recent_articles(&self, limit: u32) -> Result<Vec<StoredArticle>, IngestError> {
        let rows = sqlx::query_as::<_, StoredArticle>(
            r#"
            SELECT id, title, description, url, source_name, platform, keyword,
                   published_at, fetched_at, author, sentiment
            FROM articles ORDER BY id DESC LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The whole ledger in append order.
    pub async fn fetch_logs(&self) -> Result<Vec<FetchLogEntry>, IngestError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT platform, keyword, status, count, message, logged_at FROM fetch_logs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(platform, keyword, status, count, message, logged_at)| {
                Ok(FetchLogEntry {
                    platform,
                    keyword,
                    status: status.parse()?,
                    count: usize::try_from(count).unwrap_or_default(),
                    message,
                    logged_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn persist(&self, batch: &[CanonicalRecord]) -> Result<usize, IngestError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let _gate = self.write_gate.lock().await;
        let fetched_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;
        for r in batch {
            let res = sqlx::query(
                r#"
                INSERT INTO articles
                    (title, description, url, source_name, platform, keyword,
                     published_at, fetched_at, author)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(url) DO NOTHING
                "#,
            )
            .bind(&r.title)
            .bind(&r.description)
            .bind(&r.url)
            .bind(&r.source_name)
            .bind(&r.platform)
            .bind(&r.keyword)
            .bind(r.published_at)
            .bind(fetched_at)
            .bind(&r.author)
            .execute(&mut *tx)
            .await?;
            inserted += res.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn append_log(&self, entry: &FetchLogEntry) -> Result<(), IngestError> {
        sqlx::query(
            r#"
            INSERT INTO fetch_logs (platform, keyword, status, count, message, logged_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.platform)
        .bind(&entry.keyword)
        .bind(entry.status.as_str())
        .bind(entry.count as i64)
        .bind(&entry.message)
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
