// Persistence gateway for topics, results, completion progress, summaries,
// and tags. The `Store` trait is the seam the orchestrator works against:
// `PgStore` is the durable Postgres implementation, `MemoryStore` backs
// deterministic tests — no network, no database, no Docker.

pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use pulsepoint_common::{CompletionProgress, NormalizedItem, ResultRecord, Summary, Topic};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent create-or-get by normalized text. Returns the topic and
    /// whether it was newly created. Duplicate text is "already exists",
    /// never an error.
    async fn upsert_topic(&self, text: &str) -> Result<(Topic, bool)>;

    async fn topic_by_text(&self, text: &str) -> Result<Option<Topic>>;

    /// Up to `limit` topics with `complete = false`, chosen pseudo-randomly
    /// so a topic stuck behind a persistently-failing source cannot starve
    /// the rest.
    async fn sample_incomplete_topics(&self, limit: usize) -> Result<Vec<Topic>>;

    /// Persist a batch of normalized results for one (topic, source) pair.
    /// Returns how many were saved.
    async fn insert_results(
        &self,
        topic_id: Uuid,
        source: &str,
        items: &[NormalizedItem],
    ) -> Result<usize>;

    async fn count_results(&self, topic_id: Uuid, source: &str) -> Result<u64>;

    /// Result counts grouped by source, for reconciliation.
    async fn counts_by_source(&self, topic_id: Uuid) -> Result<BTreeMap<String, u64>>;

    /// All persisted results grouped by source, for corpus aggregation.
    async fn results_by_source(&self, topic_id: Uuid)
        -> Result<BTreeMap<String, Vec<ResultRecord>>>;

    async fn progress(&self, topic_id: Uuid) -> Result<Option<CompletionProgress>>;

    async fn summary(&self, topic_id: Uuid) -> Result<Option<Summary>>;

    /// Persist the completion progress, the regenerated summary (if any),
    /// and the materialized tag links together — one transaction per topic.
    async fn commit_topic_state(
        &self,
        progress: &CompletionProgress,
        summary: Option<&Summary>,
        tags: &[String],
    ) -> Result<()>;

    /// Tag labels that do not match any existing topic's text. Candidates
    /// for discovery; callers re-check after normalization.
    async fn unused_tags(&self, limit: usize) -> Result<Vec<String>>;
}
