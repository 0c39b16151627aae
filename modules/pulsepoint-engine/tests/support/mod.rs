// Scripted collaborators for engine tests: fetchers that return canned
// items (or fail on demand) and a summarizer stub. No network, no database.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use pulsepoint_common::{NormalizedItem, PulseError, SummaryData};
use pulsepoint_sources::{FetchFilters, SourceCatalog, SourceFetcher};
use pulsepoint_summarizer::Summarizer;

pub struct ScriptedFetcher {
    items_per_call: usize,
    fail: bool,
    pub calls: AtomicU32,
}

impl ScriptedFetcher {
    pub fn returning(items_per_call: usize) -> Arc<Self> {
        Arc::new(Self {
            items_per_call,
            fail: false,
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            items_per_call: 0,
            fail: true,
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(&self, query: &str, _filters: &FetchFilters) -> Result<Vec<Value>, PulseError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PulseError::ExhaustedRetries { attempts: 3 });
        }
        Ok((0..self.items_per_call)
            .map(|i| {
                json!({
                    "title": format!("{query} item {call}-{i}"),
                    "snippet": format!("body {call}-{i}"),
                    "url": format!("https://example.com/{call}/{i}"),
                })
            })
            .collect())
    }
}

/// Blocks inside `fetch` until released, so a pass can be held mid-flight.
pub struct GatedFetcher {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        })
    }
}

#[async_trait]
impl SourceFetcher for GatedFetcher {
    async fn fetch(&self, _query: &str, _filters: &FetchFilters) -> Result<Vec<Value>, PulseError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(vec![])
    }
}

pub struct StubSummarizer {
    pub calls: AtomicU32,
}

impl StubSummarizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(
        &self,
        topic_text: &str,
        corpus: &str,
        _language: &str,
    ) -> anyhow::Result<SummaryData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if corpus.trim().is_empty() {
            return Ok(SummaryData::no_data());
        }
        Ok(SummaryData {
            synopsis: format!("synopsis for {topic_text}"),
            insights: "insights".to_string(),
            cross_references: "cross references".to_string(),
            tags: vec!["alpha".to_string(), "beta".to_string()],
        })
    }
}

pub fn entry(id: &str, fetcher: Arc<dyn SourceFetcher>) -> (String, Arc<dyn SourceFetcher>) {
    (id.to_string(), fetcher)
}

pub fn catalog_of(entries: Vec<(String, Arc<dyn SourceFetcher>)>) -> SourceCatalog {
    SourceCatalog::new(entries)
}

pub fn seed_items(n: usize) -> Vec<NormalizedItem> {
    (0..n)
        .map(|i| NormalizedItem {
            title: format!("seed {i}"),
            snippet: format!("seed body {i}"),
            url: format!("https://example.com/seed/{i}"),
            extra: None,
        })
        .collect()
}
