use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use pulsepoint_common::SummaryData;

use crate::Summarizer;

const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(60);

const PROMPT_EN: &str = "\
You are an AI assistant that extracts structured information from text.
Return a response strictly in JSON format:
{\"synopsis\": \"A brief summary of the text.\",
 \"insights\": \"Key information or insights extracted from the text.\",
 \"cross_references\": \"relationships between references (in paragraph form)\",
 \"tags\": [\"tag1\", \"tag2\", \"tag3\"]}

Text to analyze:
";

const PROMPT_ID: &str = "\
Anda adalah asisten AI yang mengekstrak informasi terstruktur dari teks.
Kembalikan respons dalam format JSON yang ketat:
{\"synopsis\": \"Ringkasan singkat dari teks.\",
 \"insights\": \"Informasi penting atau wawasan yang ditemukan dalam teks.\",
 \"cross_references\": \"hubungan antar referensi (dalam bentuk paragraf)\",
 \"tags\": [\"tag1\", \"tag2\", \"tag3\"]}

Teks yang akan dianalisis:
";

pub struct GeminiSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: "gemini-1.5-pro".to_string(),
        }
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(
        &self,
        topic_text: &str,
        corpus: &str,
        language: &str,
    ) -> Result<SummaryData> {
        // Empty corpus: documented no-data sentinel, no network call.
        if corpus.trim().is_empty() {
            info!(topic = topic_text, "Empty corpus, returning no-data summary");
            return Ok(SummaryData::no_data());
        }

        let prompt = match language {
            "id" => format!("{PROMPT_ID}{corpus}"),
            _ => format!("{PROMPT_EN}{corpus}"),
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": 0.75,
                "topP": 0.65,
                "topK": 35,
                "maxOutputTokens": 2048,
            },
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(SUMMARIZE_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            // A quota sentinel is persisted so the topic gets retried on a
            // later pass instead of freezing unsummarized.
            warn!(topic = topic_text, "Summarizer quota exceeded");
            return Ok(SummaryData::quota_exceeded());
        }
        if !status.is_success() {
            return Err(anyhow!("summarizer returned status {status}"));
        }

        let payload: Value = response.json().await?;
        let raw = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("summarizer response carried no text"))?
            .trim()
            .to_string();

        Ok(parse_summary(&raw))
    }
}

#[derive(Deserialize)]
struct RawSummary {
    #[serde(default)]
    synopsis: String,
    #[serde(default)]
    insights: String,
    #[serde(default)]
    cross_references: Value,
    #[serde(default)]
    tags: Value,
}

/// Parse the model's answer tolerantly. Fenced JSON is unfenced, the text is
/// clamped to its outermost braces, and anything unparseable becomes a
/// summary whose synopsis is the raw text.
fn parse_summary(raw: &str) -> SummaryData {
    let cleaned = unfence(raw);
    match serde_json::from_str::<RawSummary>(&cleaned) {
        Ok(parsed) => SummaryData {
            synopsis: parsed.synopsis,
            insights: parsed.insights,
            cross_references: join_loose(&parsed.cross_references),
            tags: loose_tags(&parsed.tags),
        },
        Err(e) => {
            warn!(error = %e, "Summarizer answer was not valid JSON, keeping raw text");
            SummaryData {
                synopsis: raw.to_string(),
                insights: String::new(),
                cross_references: String::new(),
                tags: Vec::new(),
            }
        }
    }
}

fn unfence(raw: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

    let mut text = match fence.captures(raw) {
        Some(caps) => caps[1].to_string(),
        None => raw.to_string(),
    };
    if let Some(start) = text.find('{') {
        text = text[start..].to_string();
    }
    if let Some(end) = text.rfind('}') {
        text.truncate(end + 1);
    }
    text
}

/// The model sometimes returns a string where an array was asked for, or
/// vice versa. Accept both.
fn join_loose(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

fn loose_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_answer() {
        let raw = "```json\n{\"synopsis\": \"s\", \"insights\": \"i\", \"cross_references\": \"x\", \"tags\": [\"a\", \"b\"]}\n```";
        let data = parse_summary(raw);
        assert_eq!(data.synopsis, "s");
        assert_eq!(data.insights, "i");
        assert_eq!(data.cross_references, "x");
        assert_eq!(data.tags, vec!["a", "b"]);
    }

    #[test]
    fn parses_bare_json_with_leading_chatter() {
        let raw = "Sure, here you go: {\"synopsis\": \"s\", \"tags\": []} hope that helps";
        let data = parse_summary(raw);
        assert_eq!(data.synopsis, "s");
        assert!(data.tags.is_empty());
    }

    #[test]
    fn tolerates_string_tags_and_array_cross_references() {
        let raw = r#"{"synopsis": "s", "cross_references": ["a", "b"], "tags": "x, y"}"#;
        let data = parse_summary(raw);
        assert_eq!(data.cross_references, "a, b");
        assert_eq!(data.tags, vec!["x", "y"]);
    }

    #[test]
    fn unparseable_answer_becomes_raw_synopsis() {
        let raw = "I could not produce JSON today.";
        let data = parse_summary(raw);
        assert_eq!(data.synopsis, raw);
        assert!(data.tags.is_empty());
    }
}
