use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Raw completion from the judge capability, with reported usage.
#[derive(Debug, Clone)]
pub struct JudgeResponse {
    pub content: String,
    pub tokens_used: u64,
    pub cost_usd: f64,
}

/// External language-model judgment capability. Implementations wrap a
/// concrete backend; the scorers only see prompt-in, text-plus-usage-out.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<JudgeResponse>;
}

/// Embedding vector plus the usage the backend reported for producing it.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub tokens_used: u64,
    pub cost_usd: f64,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Retry/timeout budget for capability calls.
///
/// A timed-out call counts as a transient failure like any other error;
/// exhausting the budget surfaces the last error to the caller, which the
/// runner records as a terminal error for that (case, scorer) pair.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the initial one.
    pub max_retries: usize,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Run a capability call under the policy's timeout, retrying transient
/// failures with exponential backoff.
pub async fn call_with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        let err = match tokio::time::timeout(policy.timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => anyhow!("{} timed out after {:?}", what, policy.timeout),
        };

        if attempt >= policy.max_retries {
            return Err(err.context(format!("{} failed after {} attempts", what, attempt + 1)));
        }

        let delay = policy.base_delay * 2u32.pow(attempt as u32);
        tracing::warn!(call = what, attempt = attempt + 1, error = %err, delay_ms = delay.as_millis() as u64, "capability call failed, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
