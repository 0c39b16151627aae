use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    /// One source's fetch failed (bad status, timeout, malformed payload).
    /// Recovered locally as zero new results for the cycle.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The retry executor gave up after repeated rate-limit responses.
    #[error("Retries exhausted after {attempts} rate-limited attempts")]
    ExhaustedRetries { attempts: u32 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Summarizer error: {0}")]
    Summarizer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
