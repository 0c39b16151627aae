use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Source API keys
    pub newsapi_key: String,
    pub gse_api_key: String,
    pub gse_id: String,
    pub wolfram_app_id: String,

    // Summarizer
    pub gemini_api_key: String,
    pub summary_language: String,

    // Completion policy
    pub min_results_per_source: u32,
    pub max_topics_per_run: usize,
    pub api_call_delay_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            newsapi_key: required_env("NEWSAPI_KEY"),
            gse_api_key: required_env("GSE_API_KEY"),
            gse_id: required_env("GSE_ID"),
            wolfram_app_id: required_env("WOLFRAM_ALPHA_APP_ID"),
            gemini_api_key: required_env("GEMINI_API_KEY"),
            summary_language: env::var("SUMMARY_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            min_results_per_source: parsed_env("MIN_RESULTS_PER_SOURCE", 4),
            max_topics_per_run: parsed_env("MAX_TOPICS_PER_RUN", 1),
            api_call_delay_secs: parsed_env("API_CALL_DELAY_SECS", 2),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got {v:?}")),
        Err(_) => default,
    }
}
