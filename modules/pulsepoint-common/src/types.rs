use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Synopsis stored when the summarizer was called with an empty corpus.
pub const NO_DATA_SYNOPSIS: &str = "No summary available.";

/// Synopsis stored when the summarizer hit its quota. A topic carrying this
/// sentinel is re-summarized on the next pass rather than frozen forever.
pub const QUOTA_EXCEEDED_SYNOPSIS: &str = "Summary quota exceeded.";

/// A tracked research subject. `text` is the normalized form and the only
/// stable external identifier — no two topics share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Normalize raw topic text: lowercase, strip punctuation, trim whitespace.
pub fn normalize_topic(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Structured extra payload attached to a result. An explicit sum type
/// rather than a free-form JSON blob; the serde tag keeps persisted bytes
/// stable across versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtraPayload {
    Geo { lat: f64, lng: f64 },
    Themes { themes: Vec<String> },
}

/// Canonical shape every source's raw items are normalized into.
/// Absent fields are empty strings, never missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub extra: Option<ExtraPayload>,
}

/// A persisted finding. Belongs to exactly one topic; `source` is whatever
/// identifier produced it, known to the catalog or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub source: String,
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub sentiment: Option<f64>,
    pub extra: Option<ExtraPayload>,
    pub created_at: DateTime<Utc>,
}

/// Per-topic completion state: one satisfied-result counter per source plus
/// the overall completeness flag. Counters only move up during fetch cycles;
/// reconciliation recounts them from the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionProgress {
    pub topic_id: Uuid,
    pub satisfied: BTreeMap<String, u32>,
    pub complete: bool,
}

impl CompletionProgress {
    /// Fresh progress record with a zero counter for every catalog source.
    pub fn new(topic_id: Uuid, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            topic_id,
            satisfied: sources.into_iter().map(|s| (s.into(), 0)).collect(),
            complete: false,
        }
    }
}

/// Output of the summarization collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    pub synopsis: String,
    pub insights: String,
    pub cross_references: String,
    pub tags: Vec<String>,
}

impl SummaryData {
    pub fn no_data() -> Self {
        Self {
            synopsis: NO_DATA_SYNOPSIS.to_string(),
            insights: String::new(),
            cross_references: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn quota_exceeded() -> Self {
        Self {
            synopsis: QUOTA_EXCEEDED_SYNOPSIS.to_string(),
            insights: String::new(),
            cross_references: String::new(),
            tags: Vec::new(),
        }
    }
}

/// The persisted summary for a topic. At most one per topic,
/// last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub topic_id: Uuid,
    pub synopsis: String,
    pub insights: String,
    pub cross_references: String,
    pub tags: Vec<String>,
}

impl Summary {
    pub fn from_data(topic_id: Uuid, data: SummaryData) -> Self {
        Self {
            topic_id,
            synopsis: data.synopsis,
            insights: data.insights,
            cross_references: data.cross_references,
            tags: data.tags,
        }
    }

    /// True if this summary is an empty/failed placeholder rather than real
    /// content. Sentinel summaries are regenerated on the next pass.
    pub fn is_sentinel(&self) -> bool {
        self.synopsis == NO_DATA_SYNOPSIS || self.synopsis == QUOTA_EXCEEDED_SYNOPSIS
    }
}
