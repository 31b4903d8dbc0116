use crate::backends::{GenerationBackend, GenerationRequest};
use async_trait::async_trait;
use folio_core::{FolioError, FolioResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
>;

/// Configures retry behaviour for failover across generation backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries per backend before moving to the next one.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Whether an error is transient and worth retrying.
///
/// Rate limits (429), timeouts and 5xx responses are retried. Client errors
/// such as 400, configuration problems and interrupts are not.
pub fn is_retryable(err: &FolioError) -> bool {
    if matches!(
        err,
        FolioError::Interrupted(_) | FolioError::Config(_) | FolioError::Validation(_)
    ) {
        return false;
    }

    let lower = err.to_string().to_lowercase();
    if lower.contains("400") {
        return false;
    }

    lower.contains("429")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
}

/// Exponential backoff for `attempt`, capped at `backoff_max_ms`.
fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy.backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// A `GenerationBackend` that wraps several backends and performs automatic
/// failover with exponential-backoff retries.
///
/// Backends are tried in order. Within each backend a transient error is
/// retried up to `max_retries` times; a non-retryable error or exhausted
/// retries move on to the next backend. If every backend fails the last
/// error is returned.
pub struct FailoverBackend {
    backends: Vec<Box<dyn GenerationBackend>>,
    policy: RetryPolicy,
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl FailoverBackend {
    pub fn new(backends: Vec<Box<dyn GenerationBackend>>, policy: RetryPolicy) -> FolioResult<Self> {
        if backends.is_empty() {
            return Err(FolioError::Config(
                "FailoverBackend requires at least one backend".into(),
            ));
        }
        Ok(Self {
            backends,
            policy,
            #[cfg(test)]
            sleep_fn: None,
        })
    }

    async fn do_sleep(&self, ms: u64) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(ms).await;
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl GenerationBackend for FailoverBackend {
    /// The primary backend's model.
    fn model_id(&self) -> &str {
        self.backends.first().map_or("", |b| b.model_id())
    }

    async fn generate(&self, request: &GenerationRequest) -> FolioResult<String> {
        let mut last_err: Option<FolioError> = None;

        for (backend_idx, backend) in self.backends.iter().enumerate() {
            for attempt in 0..=self.policy.max_retries {
                match backend.generate(request).await {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        if !is_retryable(&e) {
                            warn!(
                                backend = backend_idx,
                                model = backend.model_id(),
                                attempt,
                                error = %e,
                                "Non-retryable error, moving to next backend"
                            );
                            last_err = Some(e);
                            break;
                        }

                        if attempt < self.policy.max_retries {
                            let delay = compute_backoff(&self.policy, attempt);
                            info!(
                                backend = backend_idx,
                                attempt,
                                delay_ms = delay,
                                error = %e,
                                "Retryable error, backing off"
                            );
                            self.do_sleep(delay).await;
                        }
                        last_err = Some(e);
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| FolioError::Generation("All failover backends exhausted".into())))
    }
}
