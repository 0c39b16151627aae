use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;

use pulsepoint_common::{Config, PulseError};

use crate::fetchers::{
    FetchFilters, NewsFetcher, SemanticScholarFetcher, SourceFetcher, WebSearchFetcher,
    WikipediaFetcher, WolframFetcher,
};

/// Static registry mapping a source identifier to its fetch capability.
/// Entry order is significant — it is the priority order sources are
/// processed in within a topic.
pub struct SourceCatalog {
    entries: Vec<(String, Arc<dyn SourceFetcher>)>,
}

impl SourceCatalog {
    pub fn new(entries: Vec<(String, Arc<dyn SourceFetcher>)>) -> Self {
        Self { entries }
    }

    /// The production catalog, in priority order.
    pub fn standard(config: &Config) -> Self {
        let client = Client::new();
        Self::new(vec![
            entry("wikipedia", WikipediaFetcher::new(client.clone())),
            entry(
                "news_everything",
                NewsFetcher::everything(client.clone(), &config.newsapi_key),
            ),
            entry(
                "news_top_headlines",
                NewsFetcher::top_headlines(client.clone(), &config.newsapi_key),
            ),
            entry(
                "web_search",
                WebSearchFetcher::new(client.clone(), &config.gse_api_key, &config.gse_id),
            ),
            entry(
                "wolfram_alpha",
                WolframFetcher::new(client.clone(), &config.wolfram_app_id),
            ),
            entry("semantic_scholar", SemanticScholarFetcher::new(client)),
        ])
    }

    /// Source identifiers in priority order.
    pub fn capabilities(&self) -> Vec<&str> {
        self.entries.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub async fn fetch(
        &self,
        source: &str,
        query: &str,
        filters: &FetchFilters,
    ) -> Result<Vec<Value>, PulseError> {
        let fetcher = self
            .entries
            .iter()
            .find(|(id, _)| id == source)
            .map(|(_, f)| f)
            .ok_or_else(|| PulseError::SourceUnavailable(format!("unknown source: {source}")))?;
        fetcher.fetch(query, filters).await
    }
}

fn entry(id: &str, fetcher: impl SourceFetcher + 'static) -> (String, Arc<dyn SourceFetcher>) {
    (id.to_string(), Arc::new(fetcher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopFetcher;

    #[async_trait]
    impl SourceFetcher for NoopFetcher {
        async fn fetch(
            &self,
            _query: &str,
            _filters: &FetchFilters,
        ) -> Result<Vec<Value>, PulseError> {
            Ok(vec![])
        }
    }

    #[test]
    fn capabilities_preserve_priority_order() {
        let catalog = SourceCatalog::new(vec![
            entry("geo_first", NoopFetcher),
            entry("second", NoopFetcher),
        ]);
        assert_eq!(catalog.capabilities(), vec!["geo_first", "second"]);
    }

    #[tokio::test]
    async fn unknown_source_is_unavailable() {
        let catalog = SourceCatalog::new(vec![]);
        let err = catalog
            .fetch("nope", "q", &FetchFilters::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::SourceUnavailable(_)));
    }
}
