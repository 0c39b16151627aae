use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use uuid::Uuid;

use pulsepoint_common::{CompletionProgress, NormalizedItem, ResultRecord, Summary, Topic};

use crate::Store;

#[derive(Default)]
struct Inner {
    topics: Vec<Topic>,
    results: Vec<ResultRecord>,
    progress: HashMap<Uuid, CompletionProgress>,
    summaries: HashMap<Uuid, Summary>,
    tags: BTreeSet<String>,
    topic_tags: HashMap<Uuid, BTreeSet<String>>,
}

/// In-memory store used by tests. Mirrors the Postgres gateway's semantics,
/// including atomic per-topic commits (a single write lock spans the whole
/// commit).
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed tag labels directly, bypassing summarization.
    pub async fn seed_tags(&self, labels: &[&str]) {
        let mut inner = self.inner.write().await;
        for label in labels {
            inner.tags.insert(label.to_string());
        }
    }

    /// Remove up to `n` persisted results for a (topic, source) pair.
    /// Simulates drift for reconciliation scenarios.
    pub async fn remove_results(&self, topic_id: Uuid, source: &str, n: usize) {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        inner.results.retain(|r| {
            if removed < n && r.topic_id == topic_id && r.source == source {
                removed += 1;
                false
            } else {
                true
            }
        });
    }

    pub async fn tags_for_topic(&self, topic_id: Uuid) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .topic_tags
            .get(&topic_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_topic(&self, text: &str) -> Result<(Topic, bool)> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.topics.iter().find(|t| t.text == text) {
            return Ok((existing.clone(), false));
        }
        let topic = Topic {
            id: Uuid::new_v4(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        inner.topics.push(topic.clone());
        Ok((topic, true))
    }

    async fn topic_by_text(&self, text: &str) -> Result<Option<Topic>> {
        let inner = self.inner.read().await;
        Ok(inner.topics.iter().find(|t| t.text == text).cloned())
    }

    async fn sample_incomplete_topics(&self, limit: usize) -> Result<Vec<Topic>> {
        let inner = self.inner.read().await;
        let mut incomplete: Vec<Topic> = inner
            .topics
            .iter()
            .filter(|t| !inner.progress.get(&t.id).map(|p| p.complete).unwrap_or(false))
            .cloned()
            .collect();
        incomplete.shuffle(&mut rand::rng());
        incomplete.truncate(limit);
        Ok(incomplete)
    }

    async fn insert_results(
        &self,
        topic_id: Uuid,
        source: &str,
        items: &[NormalizedItem],
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        for item in items {
            inner.results.push(ResultRecord {
                id: Uuid::new_v4(),
                topic_id,
                source: source.to_string(),
                title: item.title.clone(),
                snippet: item.snippet.clone(),
                url: item.url.clone(),
                sentiment: None,
                extra: item.extra.clone(),
                created_at: now,
            });
        }
        Ok(items.len())
    }

    async fn count_results(&self, topic_id: Uuid, source: &str) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .iter()
            .filter(|r| r.topic_id == topic_id && r.source == source)
            .count() as u64)
    }

    async fn counts_by_source(&self, topic_id: Uuid) -> Result<BTreeMap<String, u64>> {
        let inner = self.inner.read().await;
        let mut counts = BTreeMap::new();
        for result in inner.results.iter().filter(|r| r.topic_id == topic_id) {
            *counts.entry(result.source.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn results_by_source(
        &self,
        topic_id: Uuid,
    ) -> Result<BTreeMap<String, Vec<ResultRecord>>> {
        let inner = self.inner.read().await;
        let mut grouped: BTreeMap<String, Vec<ResultRecord>> = BTreeMap::new();
        for result in inner.results.iter().filter(|r| r.topic_id == topic_id) {
            grouped
                .entry(result.source.clone())
                .or_default()
                .push(result.clone());
        }
        Ok(grouped)
    }

    async fn progress(&self, topic_id: Uuid) -> Result<Option<CompletionProgress>> {
        let inner = self.inner.read().await;
        Ok(inner.progress.get(&topic_id).cloned())
    }

    async fn summary(&self, topic_id: Uuid) -> Result<Option<Summary>> {
        let inner = self.inner.read().await;
        Ok(inner.summaries.get(&topic_id).cloned())
    }

    async fn commit_topic_state(
        &self,
        progress: &CompletionProgress,
        summary: Option<&Summary>,
        tags: &[String],
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.progress.insert(progress.topic_id, progress.clone());
        if let Some(summary) = summary {
            inner.summaries.insert(summary.topic_id, summary.clone());
        }
        for tag in tags {
            inner.tags.insert(tag.clone());
            inner
                .topic_tags
                .entry(progress.topic_id)
                .or_default()
                .insert(tag.clone());
        }
        Ok(())
    }

    async fn unused_tags(&self, limit: usize) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let topic_texts: BTreeSet<&str> = inner.topics.iter().map(|t| t.text.as_str()).collect();
        Ok(inner
            .tags
            .iter()
            .filter(|label| !topic_texts.contains(label.as_str()))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_topic_is_idempotent() {
        let store = MemoryStore::new();
        let (first, created) = store.upsert_topic("rust").await.unwrap();
        assert!(created);
        let (second, created) = store.upsert_topic("rust").await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn incomplete_sampling_ignores_complete_topics() {
        let store = MemoryStore::new();
        let (done, _) = store.upsert_topic("done").await.unwrap();
        let (open, _) = store.upsert_topic("open").await.unwrap();

        let mut progress = CompletionProgress::new(done.id, ["a"]);
        progress.complete = true;
        store.commit_topic_state(&progress, None, &[]).await.unwrap();

        let sampled = store.sample_incomplete_topics(10).await.unwrap();
        assert_eq!(sampled.len(), 1);
        assert_eq!(sampled[0].id, open.id);
    }

    #[tokio::test]
    async fn unused_tags_excludes_existing_topic_texts() {
        let store = MemoryStore::new();
        store.seed_tags(&["x", "y"]).await;
        store.upsert_topic("x").await.unwrap();
        assert_eq!(store.unused_tags(10).await.unwrap(), vec!["y".to_string()]);
    }
}
