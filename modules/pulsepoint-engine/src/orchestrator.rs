use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use pulsepoint_common::{
    normalize_topic, CompletionProgress, Config, NormalizedItem, Summary, Topic,
};
use pulsepoint_sources::{normalize, FetchFilters, SourceCatalog};
use pulsepoint_store::Store;
use pulsepoint_summarizer::Summarizer;

use crate::aggregate::aggregate_corpus;
use crate::guard::RunGuard;
use crate::stats::PassStats;
use crate::tracker;

/// Completion policy knobs. Delay and threshold defaults are tuned against
/// the real rate limits of the standard catalog.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub min_results_per_source: u32,
    pub max_topics_per_run: usize,
    pub api_call_delay: Duration,
    pub summary_language: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_results_per_source: 4,
            max_topics_per_run: 1,
            api_call_delay: Duration::from_secs(2),
            summary_language: "en".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_results_per_source: config.min_results_per_source,
            max_topics_per_run: config.max_topics_per_run,
            api_call_delay: Duration::from_secs(config.api_call_delay_secs),
            summary_language: config.summary_language.clone(),
        }
    }
}

/// Drives the two orchestration passes: discovery (new topic from an unused
/// tag, full fetch) and completion (top up insufficient sources for known
/// incomplete topics). Both entry points are guard-protected and never let
/// a failure escape — every error degrades to partial progress plus a log
/// record.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    catalog: SourceCatalog,
    summarizer: Arc<dyn Summarizer>,
    guard: RunGuard,
    settings: EngineSettings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: SourceCatalog,
        summarizer: Arc<dyn Summarizer>,
        guard: RunGuard,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            summarizer,
            guard,
            settings,
        }
    }

    /// Completion pass: select incomplete topics and re-fetch only the
    /// sources that still lack sufficient results. Safe to invoke at any
    /// cadence.
    pub async fn run_completion_pass(&self) -> PassStats {
        let Some(_permit) = self.guard.try_acquire() else {
            info!("Another orchestration pass is in progress, skipping completion pass");
            return PassStats::guard_busy();
        };

        let mut stats = PassStats::default();
        let topics = match self
            .store
            .sample_incomplete_topics(self.settings.max_topics_per_run)
            .await
        {
            Ok(topics) => topics,
            Err(e) => {
                error!(error = %e, "Failed to select incomplete topics");
                return stats;
            }
        };

        for topic in topics {
            info!(topic = topic.text.as_str(), "Completing topic");
            match self.complete_topic(&topic, &mut stats).await {
                Ok(()) => stats.topics_processed += 1,
                Err(e) => {
                    // Nothing was committed for this topic; move on to the
                    // next one.
                    warn!(topic = topic.text.as_str(), error = %e, "Topic processing failed, continuing");
                    stats.topics_failed += 1;
                }
            }
        }

        info!("{stats}");
        stats
    }

    /// Discovery pass: turn at most one previously-unused tag into a new
    /// topic and populate it across the whole catalog. No-op when every tag
    /// already has a topic.
    pub async fn run_discovery_pass(&self) -> PassStats {
        let Some(_permit) = self.guard.try_acquire() else {
            info!("Another orchestration pass is in progress, skipping discovery pass");
            return PassStats::guard_busy();
        };

        let mut stats = PassStats::default();
        if let Err(e) = self.discover_one(&mut stats).await {
            warn!(error = %e, "Discovery pass failed");
            stats.topics_failed += 1;
        }
        info!("{stats}");
        stats
    }

    /// Recount a topic's satisfied counters from the result table and
    /// persist the repaired progress. Idempotent; used to fix drift after
    /// a crash mid-write.
    pub async fn reconcile_topic(&self, topic_text: &str) -> Result<Option<CompletionProgress>> {
        let text = normalize_topic(topic_text);
        let Some(topic) = self.store.topic_by_text(&text).await? else {
            return Ok(None);
        };

        let sources = self.catalog.capabilities();
        let counts = self.store.counts_by_source(topic.id).await?;
        let mut progress = self
            .store
            .progress(topic.id)
            .await?
            .unwrap_or_else(|| CompletionProgress::new(topic.id, sources.iter().copied()));

        tracker::reconcile(
            &mut progress,
            &counts,
            &sources,
            self.settings.min_results_per_source,
        );
        self.store.commit_topic_state(&progress, None, &[]).await?;
        info!(
            topic = text.as_str(),
            complete = progress.complete,
            "Reconciled progress from persisted results"
        );
        Ok(Some(progress))
    }

    async fn complete_topic(&self, topic: &Topic, stats: &mut PassStats) -> Result<()> {
        let sources = self.catalog.capabilities();
        let threshold = self.settings.min_results_per_source;

        // Progress is created lazily on the first cycle for a topic.
        let mut progress = self
            .store
            .progress(topic.id)
            .await?
            .unwrap_or_else(|| CompletionProgress::new(topic.id, sources.iter().copied()));
        let was_complete = progress.complete;

        for source in &sources {
            let persisted = self.store.count_results(topic.id, source).await?;
            tracker::observe_persisted(&mut progress, source, persisted);

            if persisted >= u64::from(threshold) {
                info!(source, persisted, "Source already sufficient, skipping");
                stats.sources_skipped += 1;
                continue;
            }

            info!(source, persisted, "Source insufficient, re-fetching");
            let saved = self.fetch_and_store(topic, source, stats).await?;
            tracker::merge_add(&mut progress, source, saved);

            // Shared rate-limit courtesy between network calls; skipped
            // sources above never pay it.
            tokio::time::sleep(self.settings.api_call_delay).await;
        }

        progress.complete = tracker::evaluate_complete(&progress, &sources, threshold);
        self.finalize_topic(topic, progress, was_complete, false, stats)
            .await
    }

    async fn discover_one(&self, stats: &mut PassStats) -> Result<()> {
        let candidates = self.store.unused_tags(25).await?;
        let mut chosen = None;
        for label in candidates {
            let text = normalize_topic(&label);
            if text.is_empty() {
                continue;
            }
            // The store compares raw labels; re-check after normalization
            // so a tag colliding with an existing topic is skipped.
            if self.store.topic_by_text(&text).await?.is_none() {
                chosen = Some((label, text));
                break;
            }
        }
        let Some((label, text)) = chosen else {
            info!("No unused tags, discovery pass is a no-op");
            return Ok(());
        };

        info!(tag = label.as_str(), topic = text.as_str(), "Discovered new topic from tag");
        let (topic, created) = self.store.upsert_topic(&text).await?;
        if !created {
            // Lost a race with another writer; the completion pass will
            // pick the topic up.
            info!(topic = text.as_str(), "Topic already existed, skipping discovery fetch");
            return Ok(());
        }

        let sources = self.catalog.capabilities();
        let mut progress = CompletionProgress::new(topic.id, sources.iter().copied());
        for source in &sources {
            let saved = self.fetch_and_store(&topic, source, stats).await?;
            tracker::merge_add(&mut progress, source, saved);
            tokio::time::sleep(self.settings.api_call_delay).await;
        }
        progress.complete =
            tracker::evaluate_complete(&progress, &sources, self.settings.min_results_per_source);

        // Discovery always ends with a summarization attempt.
        let done = self
            .finalize_topic(&topic, progress, false, true, stats)
            .await;
        if done.is_ok() {
            stats.topics_processed += 1;
        }
        done
    }

    /// Fetch one source, normalize, persist. Source failures are recovered
    /// locally as zero new results — one bad source never blocks the rest.
    async fn fetch_and_store(
        &self,
        topic: &Topic,
        source: &str,
        stats: &mut PassStats,
    ) -> Result<u32> {
        stats.sources_fetched += 1;
        let raw = match self
            .catalog
            .fetch(source, &topic.text, &FetchFilters::none())
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(source, error = %e, "Fetch failed, treating as zero new results");
                return Ok(0);
            }
        };

        let items: Vec<NormalizedItem> = raw.iter().filter_map(|v| normalize(source, v)).collect();
        if items.is_empty() {
            info!(source, "No new results");
            return Ok(0);
        }

        let saved = self
            .store
            .insert_results(topic.id, source, &items)
            .await
            .context("Failed to save results")?;
        info!(source, saved, "Saved new results");
        stats.results_saved += saved as u32;
        Ok(saved as u32)
    }

    /// Evaluate the summary-regeneration rule, then commit progress,
    /// summary, and materialized tags together.
    async fn finalize_topic(
        &self,
        topic: &Topic,
        progress: CompletionProgress,
        was_complete: bool,
        force_summary: bool,
        stats: &mut PassStats,
    ) -> Result<()> {
        let existing = self.store.summary(topic.id).await?;
        let regenerate = force_summary || tracker::needs_summary(was_complete, existing.as_ref());

        let (summary, tags) = if regenerate {
            match self.generate_summary(topic).await {
                Ok(summary) => {
                    stats.summaries_generated += 1;
                    let tags = summary.tags.clone();
                    (Some(summary), tags)
                }
                Err(e) => {
                    // Keep whatever summary was there before.
                    warn!(topic = topic.text.as_str(), error = %e, "Summary regeneration failed, keeping previous");
                    (None, Vec::new())
                }
            }
        } else {
            (None, Vec::new())
        };

        self.store
            .commit_topic_state(&progress, summary.as_ref(), &tags)
            .await
            .context("Failed to commit topic state")?;

        if progress.complete {
            info!(topic = topic.text.as_str(), "Topic is now complete");
            stats.topics_completed += 1;
        }
        Ok(())
    }

    async fn generate_summary(&self, topic: &Topic) -> Result<Summary> {
        let by_source = self.store.results_by_source(topic.id).await?;
        let corpus = aggregate_corpus(&by_source, &self.catalog.capabilities());
        let data = self
            .summarizer
            .summarize(&topic.text, &corpus, &self.settings.summary_language)
            .await?;
        Ok(Summary::from_data(topic.id, data))
    }
}
