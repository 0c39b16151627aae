use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use pulsepoint_common::PulseError;

/// Hard cap on any single outbound request so one unresponsive source
/// cannot stall a whole pass.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single fetch attempt, classified by the operation itself.
pub enum Attempt {
    /// Got a payload.
    Payload(Value),
    /// Rate-limit response (HTTP 429 equivalent) — worth backing off and retrying.
    RateLimited,
    /// Any other failure — not transient, do not retry.
    Failed(String),
}

/// Wraps outbound fetches with bounded retries and exponential backoff on
/// rate-limit responses. Non-transient failures abort immediately and yield
/// an empty JSON object so callers treat "no data" uniformly; only repeated
/// rate limiting surfaces as `ExhaustedRetries`.
pub struct RetryExecutor {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryExecutor {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// The tuned production policy: 3 attempts, 2s base delay.
    /// Worst case 2+4+8 = 14s of backoff before giving up.
    pub fn default_policy() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    pub async fn execute<F, Fut>(&self, mut op: F) -> Result<Value, PulseError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt>,
    {
        for attempt in 0..self.max_attempts {
            match op().await {
                Attempt::Payload(payload) => return Ok(payload),
                Attempt::RateLimited => {
                    let wait = self.base_delay * 2u32.pow(attempt);
                    warn!(
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs(),
                        "Rate limited, backing off before retry"
                    );
                    tokio::time::sleep(wait).await;
                }
                Attempt::Failed(msg) => {
                    warn!(error = msg.as_str(), "Request failed, not retrying");
                    return Ok(Value::Object(Default::default()));
                }
            }
        }
        Err(PulseError::ExhaustedRetries {
            attempts: self.max_attempts,
        })
    }

    /// GET a JSON payload with rate-limit retry. Each request carries a
    /// finite timeout.
    pub async fn get_json(
        &self,
        client: &reqwest::Client,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, PulseError> {
        self.execute(|| {
            let req = client.get(url).query(query).timeout(FETCH_TIMEOUT);
            async move {
                let response = match req.send().await {
                    Ok(r) => r,
                    Err(e) => return Attempt::Failed(format!("request to {url} failed: {e}")),
                };
                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Attempt::RateLimited;
                }
                if !status.is_success() {
                    return Attempt::Failed(format!("{url} returned status {status}"));
                }
                match response.json::<Value>().await {
                    Ok(payload) => Attempt::Payload(payload),
                    Err(e) => Attempt::Failed(format!("invalid JSON from {url}: {e}")),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_returns_payload() {
        let executor = RetryExecutor::default_policy();
        let result = executor
            .execute(|| async { Attempt::Payload(serde_json::json!({"ok": true})) })
            .await
            .unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_backs_off_exponentially_then_succeeds() {
        let executor = RetryExecutor::default_policy();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Attempt::RateLimited
                    } else {
                        Attempt::Payload(serde_json::json!([]))
                    }
                }
            })
            .await
            .unwrap();

        assert!(result.is_array());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoffs: 2s then 4s.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_after_max_attempts() {
        let executor = RetryExecutor::default_policy();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let err = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Attempt::RateLimited }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PulseError::ExhaustedRetries { attempts: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Full backoff schedule: 2+4+8 = 14s.
        assert_eq!(start.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failure_aborts_with_empty_object() {
        let executor = RetryExecutor::default_policy();
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Attempt::Failed("500 Internal Server Error".to_string()) }
            })
            .await
            .unwrap();

        // No retry, and "no data" comes back as an empty container, not null.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, Value::Object(Default::default()));
    }
}
