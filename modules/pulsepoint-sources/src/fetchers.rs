use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use pulsepoint_common::PulseError;

use crate::retry::RetryExecutor;

/// Optional narrowing applied to a fetch: terms to exclude from results,
/// a language hint, and a date range where the source supports one.
#[derive(Debug, Clone, Default)]
pub struct FetchFilters {
    pub exclude_terms: Vec<String>,
    pub language: Option<String>,
    pub date_range: Option<(String, String)>,
}

impl FetchFilters {
    pub fn none() -> Self {
        Self::default()
    }

    /// True if any exclusion term appears in the title or body text.
    fn excludes(&self, title: &str, body: &str) -> bool {
        self.exclude_terms.iter().any(|term| {
            let term = term.trim().to_lowercase();
            !term.is_empty()
                && (title.to_lowercase().contains(&term) || body.to_lowercase().contains(&term))
        })
    }
}

/// One external data provider. Implementations return loosely-typed records
/// and an empty list on zero matches; failures surface only through the
/// retry executor's signaling.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, query: &str, filters: &FetchFilters) -> Result<Vec<Value>, PulseError>;
}

fn items_array(payload: &Value, path: &[&str]) -> Vec<Value> {
    let mut cursor = payload;
    for key in path {
        cursor = &cursor[*key];
    }
    cursor.as_array().cloned().unwrap_or_default()
}

fn text(item: &Value, key: &str) -> String {
    item[key].as_str().unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Wikipedia
// ---------------------------------------------------------------------------

pub struct WikipediaFetcher {
    client: Client,
    retry: RetryExecutor,
    num_results: u32,
}

impl WikipediaFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryExecutor::default_policy(),
            num_results: 10,
        }
    }
}

#[async_trait]
impl SourceFetcher for WikipediaFetcher {
    async fn fetch(&self, query: &str, filters: &FetchFilters) -> Result<Vec<Value>, PulseError> {
        let payload = self
            .retry
            .get_json(
                &self.client,
                "https://en.wikipedia.org/w/api.php",
                &[
                    ("action", "query".to_string()),
                    ("list", "search".to_string()),
                    ("srsearch", query.to_string()),
                    ("format", "json".to_string()),
                    ("srlimit", self.num_results.to_string()),
                ],
            )
            .await?;

        let items = items_array(&payload, &["query", "search"])
            .into_iter()
            .filter(|item| {
                !filters.excludes(&text(item, "title"), &text(item, "snippet"))
            })
            .map(|item| {
                // Reshape into title/summary/url records; the article URL is
                // derived from the title since the search API does not
                // return one.
                let title = text(&item, "title");
                let url = format!(
                    "https://en.wikipedia.org/wiki/{}",
                    title.replace(' ', "_")
                );
                json!({
                    "title": title,
                    "summary": strip_html(&text(&item, "snippet")),
                    "url": url,
                })
            })
            .collect();
        Ok(items)
    }
}

/// Wikipedia search snippets carry `<span>` highlight markup.
fn strip_html(snippet: &str) -> String {
    let mut out = String::with_capacity(snippet.len());
    let mut in_tag = false;
    for c in snippet.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// NewsAPI (everything + top-headlines)
// ---------------------------------------------------------------------------

pub struct NewsFetcher {
    client: Client,
    retry: RetryExecutor,
    api_key: String,
    endpoint: &'static str,
    page_size: u32,
}

impl NewsFetcher {
    pub fn everything(client: Client, api_key: &str) -> Self {
        Self::new(client, api_key, "everything")
    }

    pub fn top_headlines(client: Client, api_key: &str) -> Self {
        Self::new(client, api_key, "top-headlines")
    }

    fn new(client: Client, api_key: &str, endpoint: &'static str) -> Self {
        Self {
            client,
            retry: RetryExecutor::default_policy(),
            api_key: api_key.to_string(),
            endpoint,
            page_size: 10,
        }
    }
}

#[async_trait]
impl SourceFetcher for NewsFetcher {
    async fn fetch(&self, query: &str, filters: &FetchFilters) -> Result<Vec<Value>, PulseError> {
        let url = format!("https://newsapi.org/v2/{}", self.endpoint);
        let language = filters.language.clone().unwrap_or_else(|| "en".to_string());
        let mut params = vec![
            ("q", query.to_string()),
            ("language", language),
            ("pageSize", self.page_size.to_string()),
            ("apiKey", self.api_key.clone()),
        ];
        // Only the everything endpoint supports date narrowing.
        if self.endpoint == "everything" {
            if let Some((from, to)) = &filters.date_range {
                params.push(("from", from.clone()));
                params.push(("to", to.clone()));
            }
        }

        let payload = self.retry.get_json(&self.client, &url, &params).await?;

        let articles = items_array(&payload, &["articles"])
            .into_iter()
            .filter(|a| !filters.excludes(&text(a, "title"), &text(a, "description")))
            .collect();
        Ok(articles)
    }
}

// ---------------------------------------------------------------------------
// Google Custom Search
// ---------------------------------------------------------------------------

pub struct WebSearchFetcher {
    client: Client,
    retry: RetryExecutor,
    api_key: String,
    engine_id: String,
    num_results: u32,
}

impl WebSearchFetcher {
    pub fn new(client: Client, api_key: &str, engine_id: &str) -> Self {
        Self {
            client,
            retry: RetryExecutor::default_policy(),
            api_key: api_key.to_string(),
            engine_id: engine_id.to_string(),
            num_results: 10,
        }
    }
}

#[async_trait]
impl SourceFetcher for WebSearchFetcher {
    async fn fetch(&self, query: &str, filters: &FetchFilters) -> Result<Vec<Value>, PulseError> {
        let payload = self
            .retry
            .get_json(
                &self.client,
                "https://www.googleapis.com/customsearch/v1",
                &[
                    ("q", query.to_string()),
                    ("key", self.api_key.clone()),
                    ("cx", self.engine_id.clone()),
                    ("safe", "off".to_string()),
                    ("num", self.num_results.to_string()),
                    ("filter", "0".to_string()),
                ],
            )
            .await?;

        let items = items_array(&payload, &["items"])
            .into_iter()
            .filter(|item| !filters.excludes(&text(item, "title"), &text(item, "snippet")))
            .collect();
        Ok(items)
    }
}

// ---------------------------------------------------------------------------
// Wolfram Alpha
// ---------------------------------------------------------------------------

pub struct WolframFetcher {
    client: Client,
    retry: RetryExecutor,
    app_id: String,
}

impl WolframFetcher {
    pub fn new(client: Client, app_id: &str) -> Self {
        Self {
            client,
            retry: RetryExecutor::default_policy(),
            app_id: app_id.to_string(),
        }
    }
}

#[async_trait]
impl SourceFetcher for WolframFetcher {
    async fn fetch(&self, query: &str, _filters: &FetchFilters) -> Result<Vec<Value>, PulseError> {
        let payload = self
            .retry
            .get_json(
                &self.client,
                "https://api.wolframalpha.com/v2/query",
                &[
                    ("input", query.to_string()),
                    ("format", "plaintext".to_string()),
                    ("output", "json".to_string()),
                    ("appid", self.app_id.clone()),
                ],
            )
            .await?;

        // Flatten pods/subpods into one record per non-empty plaintext.
        // Wolfram provides no per-result URLs.
        let mut results = Vec::new();
        for pod in items_array(&payload, &["queryresult", "pods"]) {
            let title = text(&pod, "title");
            for subpod in items_array(&pod, &["subpods"]) {
                let plaintext = text(&subpod, "plaintext");
                let plaintext = plaintext.trim();
                if !plaintext.is_empty() {
                    results.push(json!({
                        "title": title,
                        "snippet": plaintext,
                        "url": "",
                    }));
                }
            }
        }
        if results.is_empty() {
            warn!(query, "Wolfram Alpha returned no usable results");
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Semantic Scholar
// ---------------------------------------------------------------------------

const ABSTRACT_SNIPPET_CHARS: usize = 500;

pub struct SemanticScholarFetcher {
    client: Client,
    retry: RetryExecutor,
    num_results: u32,
}

impl SemanticScholarFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryExecutor::default_policy(),
            num_results: 5,
        }
    }
}

#[async_trait]
impl SourceFetcher for SemanticScholarFetcher {
    async fn fetch(&self, query: &str, filters: &FetchFilters) -> Result<Vec<Value>, PulseError> {
        let mut params = vec![
            ("query", query.to_string()),
            ("limit", self.num_results.to_string()),
            ("fields", "title,abstract,url".to_string()),
        ];
        if let Some((from, to)) = &filters.date_range {
            params.push(("year", format!("{from}-{to}")));
        }

        let payload = self
            .retry
            .get_json(
                &self.client,
                "https://api.semanticscholar.org/graph/v1/paper/search",
                &params,
            )
            .await?;

        let papers = items_array(&payload, &["data"])
            .into_iter()
            .filter(|p| !filters.excludes(&text(p, "title"), &text(p, "abstract")))
            .map(|paper| {
                let full = text(&paper, "abstract");
                let snippet = if full.chars().count() > ABSTRACT_SNIPPET_CHARS {
                    let truncated: String = full.chars().take(ABSTRACT_SNIPPET_CHARS).collect();
                    format!("{truncated}...")
                } else {
                    full
                };
                json!({
                    "title": text(&paper, "title"),
                    "abstract": snippet,
                    "url": text(&paper, "url"),
                })
            })
            .collect();
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_exclude_matches_title_or_body_case_insensitively() {
        let filters = FetchFilters {
            exclude_terms: vec!["Spam".to_string(), "  ".to_string()],
            ..Default::default()
        };
        assert!(filters.excludes("Pure SPAM here", ""));
        assert!(filters.excludes("", "a spammy spam body"));
        assert!(!filters.excludes("clean title", "clean body"));
    }

    #[test]
    fn strip_html_removes_highlight_spans() {
        assert_eq!(
            strip_html(r#"a <span class="hl">rust</span> crate"#),
            "a rust crate"
        );
        assert_eq!(strip_html("no markup"), "no markup");
    }

    #[test]
    fn items_array_handles_missing_paths() {
        let payload = json!({"query": {"search": [{"title": "t"}]}});
        assert_eq!(items_array(&payload, &["query", "search"]).len(), 1);
        assert!(items_array(&payload, &["articles"]).is_empty());
        assert!(items_array(&json!(null), &["data"]).is_empty());
    }
}
