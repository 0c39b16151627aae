pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;

use pulsepoint_common::SummaryData;

pub use gemini::GeminiSummarizer;

/// The summarization collaborator. Must tolerate an empty corpus (returns
/// the no-data sentinel rather than failing the pass).
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        topic_text: &str,
        corpus: &str,
        language: &str,
    ) -> Result<SummaryData>;
}
