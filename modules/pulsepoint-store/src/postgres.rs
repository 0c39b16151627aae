use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use pulsepoint_common::{CompletionProgress, NormalizedItem, ResultRecord, Summary, Topic};

use crate::Store;

/// Postgres-backed persistence gateway.
pub struct PgStore {
    pool: PgPool,
}

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS topics (
        id UUID PRIMARY KEY,
        text TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS results (
        id UUID PRIMARY KEY,
        topic_id UUID NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
        source TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        snippet TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL DEFAULT '',
        sentiment DOUBLE PRECISION,
        extra JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_results_topic_source ON results(topic_id, source)",
    "CREATE TABLE IF NOT EXISTS progress (
        topic_id UUID PRIMARY KEY REFERENCES topics(id) ON DELETE CASCADE,
        satisfied JSONB NOT NULL,
        complete BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE TABLE IF NOT EXISTS summaries (
        topic_id UUID PRIMARY KEY REFERENCES topics(id) ON DELETE CASCADE,
        synopsis TEXT NOT NULL DEFAULT '',
        insights TEXT NOT NULL DEFAULT '',
        cross_references TEXT NOT NULL DEFAULT '',
        tags TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS tags (
        id UUID PRIMARY KEY,
        label TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS topic_tags (
        topic_id UUID NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
        tag_id UUID NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (topic_id, tag_id)
    )",
];

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema setup.
    pub async fn migrate(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Schema migration complete");
        Ok(())
    }
}

fn topic_from_row(row: &PgRow) -> Result<Topic> {
    Ok(Topic {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
    })
}

fn result_from_row(row: &PgRow) -> Result<ResultRecord> {
    let extra: Option<serde_json::Value> = row.try_get("extra")?;
    Ok(ResultRecord {
        id: row.try_get("id")?,
        topic_id: row.try_get("topic_id")?,
        source: row.try_get("source")?,
        title: row.try_get("title")?,
        snippet: row.try_get("snippet")?,
        url: row.try_get("url")?,
        sentiment: row.try_get("sentiment")?,
        extra: extra.and_then(|v| serde_json::from_value(v).ok()),
        created_at: row.try_get("created_at")?,
    })
}

fn split_tags(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_topic(&self, text: &str) -> Result<(Topic, bool)> {
        // Insert-or-skip, then read back: duplicate text is "already
        // exists", never an error.
        let inserted = sqlx::query(
            "INSERT INTO topics (id, text, created_at) VALUES ($1, $2, $3)
             ON CONFLICT (text) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(text)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id, text, created_at FROM topics WHERE text = $1")
            .bind(text)
            .fetch_one(&self.pool)
            .await?;
        Ok((topic_from_row(&row)?, inserted.rows_affected() > 0))
    }

    async fn topic_by_text(&self, text: &str) -> Result<Option<Topic>> {
        let row = sqlx::query("SELECT id, text, created_at FROM topics WHERE text = $1")
            .bind(text)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(topic_from_row).transpose()
    }

    async fn sample_incomplete_topics(&self, limit: usize) -> Result<Vec<Topic>> {
        let rows = sqlx::query(
            "SELECT t.id, t.text, t.created_at FROM topics t
             LEFT JOIN progress p ON p.topic_id = t.id
             WHERE COALESCE(p.complete, FALSE) = FALSE
             ORDER BY random() LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(topic_from_row).collect()
    }

    async fn insert_results(
        &self,
        topic_id: Uuid,
        source: &str,
        items: &[NormalizedItem],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        for item in items {
            let extra = item
                .extra
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?;
            sqlx::query(
                "INSERT INTO results (id, topic_id, source, title, snippet, url, extra, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::new_v4())
            .bind(topic_id)
            .bind(source)
            .bind(&item.title)
            .bind(&item.snippet)
            .bind(&item.url)
            .bind(extra)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(items.len())
    }

    async fn count_results(&self, topic_id: Uuid, source: &str) -> Result<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM results WHERE topic_id = $1 AND source = $2",
        )
        .bind(topic_id)
        .bind(source)
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    async fn counts_by_source(&self, topic_id: Uuid) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS n FROM results WHERE topic_id = $1 GROUP BY source",
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await?;
        let mut counts = BTreeMap::new();
        for row in rows {
            let source: String = row.try_get("source")?;
            let n: i64 = row.try_get("n")?;
            counts.insert(source, n as u64);
        }
        Ok(counts)
    }

    async fn results_by_source(
        &self,
        topic_id: Uuid,
    ) -> Result<BTreeMap<String, Vec<ResultRecord>>> {
        let rows = sqlx::query(
            "SELECT id, topic_id, source, title, snippet, url, sentiment, extra, created_at
             FROM results WHERE topic_id = $1 ORDER BY source, created_at",
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await?;
        let mut grouped: BTreeMap<String, Vec<ResultRecord>> = BTreeMap::new();
        for row in &rows {
            let record = result_from_row(row)?;
            grouped.entry(record.source.clone()).or_default().push(record);
        }
        Ok(grouped)
    }

    async fn progress(&self, topic_id: Uuid) -> Result<Option<CompletionProgress>> {
        let row = sqlx::query("SELECT satisfied, complete FROM progress WHERE topic_id = $1")
            .bind(topic_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let satisfied: serde_json::Value = row.try_get("satisfied")?;
        Ok(Some(CompletionProgress {
            topic_id,
            satisfied: serde_json::from_value(satisfied)
                .context("Corrupt satisfied-count map in progress row")?,
            complete: row.try_get("complete")?,
        }))
    }

    async fn summary(&self, topic_id: Uuid) -> Result<Option<Summary>> {
        let row = sqlx::query(
            "SELECT synopsis, insights, cross_references, tags
             FROM summaries WHERE topic_id = $1",
        )
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        let tags: String = row.try_get("tags")?;
        Ok(Some(Summary {
            topic_id,
            synopsis: row.try_get("synopsis")?,
            insights: row.try_get("insights")?,
            cross_references: row.try_get("cross_references")?,
            tags: split_tags(&tags),
        }))
    }

    async fn commit_topic_state(
        &self,
        progress: &CompletionProgress,
        summary: Option<&Summary>,
        tags: &[String],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO progress (topic_id, satisfied, complete) VALUES ($1, $2, $3)
             ON CONFLICT (topic_id) DO UPDATE
             SET satisfied = EXCLUDED.satisfied, complete = EXCLUDED.complete",
        )
        .bind(progress.topic_id)
        .bind(serde_json::to_value(&progress.satisfied)?)
        .bind(progress.complete)
        .execute(&mut *tx)
        .await?;

        if let Some(summary) = summary {
            sqlx::query(
                "INSERT INTO summaries (topic_id, synopsis, insights, cross_references, tags)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (topic_id) DO UPDATE
                 SET synopsis = EXCLUDED.synopsis, insights = EXCLUDED.insights,
                     cross_references = EXCLUDED.cross_references, tags = EXCLUDED.tags",
            )
            .bind(summary.topic_id)
            .bind(&summary.synopsis)
            .bind(&summary.insights)
            .bind(&summary.cross_references)
            .bind(summary.tags.join(", "))
            .execute(&mut *tx)
            .await?;
        }

        for label in tags {
            sqlx::query("INSERT INTO tags (id, label) VALUES ($1, $2) ON CONFLICT (label) DO NOTHING")
                .bind(Uuid::new_v4())
                .bind(label)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO topic_tags (topic_id, tag_id)
                 SELECT $1, id FROM tags WHERE label = $2
                 ON CONFLICT DO NOTHING",
            )
            .bind(progress.topic_id)
            .bind(label)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn unused_tags(&self, limit: usize) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT label FROM tags g
             WHERE NOT EXISTS (SELECT 1 FROM topics t WHERE t.text = g.label)
             ORDER BY label LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("label").map_err(Into::into))
            .collect()
    }
}
