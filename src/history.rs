//! History store: append-only run snapshots in embedded SQLite.
//!
//! `persist` writes one run inside a single transaction guarded by a writer
//! mutex, so a run is either fully visible to queries or not at all, and two
//! overlapping runs never interleave. The pipeline never updates or deletes
//! rows; retention is an operator action outside this crate. The schema is a
//! contract for downstream tooling (reports, ad hoc SQL) and only ever grows
//! additively.

use chrono::{DateTime, Utc};
use metrics::counter;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tokio::sync::Mutex;

use crate::error::PipelineError;
use crate::trend::{Category, HistoryRecord, Trend};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS trend_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        keyword TEXT NOT NULL,
        category TEXT NOT NULL,
        sentiment_score REAL,
        composite_score REAL NOT NULL,
        total_volume REAL NOT NULL,
        platforms TEXT NOT NULL,
        first_seen TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        run_ts TEXT NOT NULL,
        UNIQUE (keyword, run_ts)
    )",
    "CREATE INDEX IF NOT EXISTS idx_trend_history_run_ts ON trend_history (run_ts)",
    "CREATE INDEX IF NOT EXISTS idx_trend_history_keyword ON trend_history (keyword)",
];

/// Per-keyword aggregation across runs (how often a keyword trended).
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordFrequency {
    pub keyword: String,
    pub runs: i64,
    pub avg_composite: f64,
}

pub struct HistoryStore {
    pool: SqlitePool,
    // Single-writer discipline: one run's persistence at a time.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    /// Open (and create if missing) a file-backed store.
    pub async fn open(path: &Path) -> Result<Self, PipelineError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    /// In-memory store for tests. One connection, or every connection would
    /// see its own private database.
    pub async fn open_in_memory() -> Result<Self, PipelineError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, PipelineError> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    /// Persist one run's trends atomically. On any failure the transaction
    /// rolls back and nothing of the run is visible.
    pub async fn persist(
        &self,
        run_ts: DateTime<Utc>,
        trends: &[Trend],
    ) -> Result<(), PipelineError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for t in trends {
            let platforms =
                serde_json::to_string(&t.sources).unwrap_or_else(|_| "[]".to_string());
            sqlx::query(
                "INSERT INTO trend_history \
                 (keyword, category, sentiment_score, composite_score, total_volume, \
                  platforms, first_seen, last_seen, run_ts) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&t.keyword)
            .bind(t.category.as_str())
            .bind(t.sentiment_score)
            .bind(t.composite_score)
            .bind(t.total_volume())
            .bind(platforms)
            .bind(t.first_seen)
            .bind(t.last_seen)
            .bind(run_ts)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        counter!("history_persisted_total").increment(trends.len() as u64);
        Ok(())
    }

    /// Query records whose `run_ts` falls inside the inclusive range,
    /// optionally filtered by keyword substring. Ordering is deterministic:
    /// run, then composite desc, then keyword.
    pub async fn query(
        &self,
        keyword_filter: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, PipelineError> {
        let rows = match keyword_filter {
            Some(filter) => {
                sqlx::query(
                    "SELECT keyword, category, sentiment_score, composite_score, total_volume, \
                            platforms, first_seen, last_seen, run_ts \
                     FROM trend_history \
                     WHERE run_ts >= ? AND run_ts <= ? AND keyword LIKE ? \
                     ORDER BY run_ts ASC, composite_score DESC, keyword ASC",
                )
                .bind(from)
                .bind(to)
                .bind(format!("%{filter}%"))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT keyword, category, sentiment_score, composite_score, total_volume, \
                            platforms, first_seen, last_seen, run_ts \
                     FROM trend_history \
                     WHERE run_ts >= ? AND run_ts <= ? \
                     ORDER BY run_ts ASC, composite_score DESC, keyword ASC",
                )
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let platforms: String = row.try_get("platforms")?;
            let category: String = row.try_get("category")?;
            out.push(HistoryRecord {
                keyword: row.try_get("keyword")?,
                category: Category::from_label(&category),
                sentiment_score: row.try_get("sentiment_score")?,
                composite_score: row.try_get("composite_score")?,
                total_volume: row.try_get("total_volume")?,
                sources: serde_json::from_str(&platforms).unwrap_or_default(),
                first_seen: row.try_get("first_seen")?,
                last_seen: row.try_get("last_seen")?,
                run_ts: row.try_get("run_ts")?,
            });
        }
        Ok(out)
    }

    /// How often each keyword trended since `from`, most frequent first.
    pub async fn keyword_frequency(
        &self,
        from: DateTime<Utc>,
        top_n: u32,
    ) -> Result<Vec<KeywordFrequency>, PipelineError> {
        let rows = sqlx::query(
            "SELECT keyword, COUNT(*) AS runs, AVG(composite_score) AS avg_composite \
             FROM trend_history \
             WHERE run_ts >= ? \
             GROUP BY keyword \
             ORDER BY runs DESC, avg_composite DESC, keyword ASC \
             LIMIT ?",
        )
        .bind(from)
        .bind(top_n)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(KeywordFrequency {
                keyword: row.try_get("keyword")?,
                runs: row.try_get("runs")?,
                avg_composite: row.try_get("avg_composite")?,
            });
        }
        Ok(out)
    }
}
