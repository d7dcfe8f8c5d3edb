//! Timeouts and the single retry for gateway calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use mentor_core::config::ChatConfig;
use mentor_core::error::{MentorError, Result};

/// How gateway calls are bounded and retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause before the one retry.
    pub backoff: Duration,
    /// Upper bound on each attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            backoff: Duration::from_millis(config.retry_backoff_ms),
            timeout: Duration::from_secs(config.gateway_timeout_secs),
        }
    }
}

/// Run `fut` under the policy's timeout.
///
/// An elapsed timeout is reported through `on_timeout` so it carries the
/// calling gateway's own failure class.
pub async fn guarded<T, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    on_timeout: fn(String) -> MentorError,
    fut: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(policy.timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!(
            "{} timed out after {}s",
            operation,
            policy.timeout.as_secs_f32()
        ))),
    }
}

/// Run `op` under the timeout, retrying once after the backoff if the first
/// attempt fails with a transient error.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    on_timeout: fn(String) -> MentorError,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match guarded(policy, operation, on_timeout, op()).await {
        Err(e) if e.is_transient() => {
            warn!(operation, error = %e, "Transient gateway failure, retrying once");
            tokio::time::sleep(policy.backoff).await;
            guarded(policy, operation, on_timeout, op()).await
        }
        other => other,
    }
}
