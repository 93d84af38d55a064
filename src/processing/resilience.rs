//! Timeout and retry wrappers for collaborator calls.

use super::types::{PipelineError, ServiceKind};
use crate::config::Config;
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first call included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Ceiling for any single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Timeout and retry settings applied to every collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Upper bound for one attempt.
    pub timeout: Duration,
    /// Retry schedule for idempotent calls.
    pub retry: RetryPolicy,
}

impl CallPolicy {
    /// Derive the policy from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.service_timeout,
            retry: RetryPolicy {
                max_attempts: config.retry_max_attempts.max(1),
                initial_backoff: config.retry_initial_backoff,
                max_backoff: config.retry_max_backoff,
            },
        }
    }
}

/// Run `future`, converting expiry into [`PipelineError::Timeout`].
pub async fn with_timeout<T, F>(
    service: ServiceKind,
    after: Duration,
    future: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                %service,
                timeout_ms = after.as_millis() as u64,
                "Collaborator call timed out"
            );
            Err(PipelineError::Timeout { service, after })
        }
    }
}

/// Run `operation` with a per-attempt timeout, retrying retryable failures with backoff.
///
/// Only use this for idempotent calls.
pub async fn with_retry<T, F, Fut>(
    service: ServiceKind,
    policy: &CallPolicy,
    mut operation: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let max_attempts = policy.retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match with_timeout(service, policy.timeout, operation()).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(%service, attempt, "Collaborator call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                let delay = policy.retry.backoff_for(attempt);
                tracing::warn!(
                    %service,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Collaborator call failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(200),
            retry: RetryPolicy {
                max_attempts,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(4),
            },
        }
    }

    fn unavailable() -> PipelineError {
        PipelineError::ExternalService {
            service: ServiceKind::Embedding,
            message: "503".into(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = policy(5).retry;
        assert_eq!(retry.backoff_for(1), Duration::from_millis(1));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(2));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(4));
        assert_eq!(retry.backoff_for(10), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(ServiceKind::Embedding, &policy(3), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(unavailable())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.expect("third attempt succeeds"), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(ServiceKind::Embedding, &policy(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(matches!(result, Err(PipelineError::ExternalService { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(ServiceKind::VectorStore, &policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PipelineError::CollectionNotFound("c1".into())) }
        })
        .await;

        assert!(matches!(result, Err(PipelineError::CollectionNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_surface_as_timeouts() {
        let result: Result<(), _> =
            with_timeout(ServiceKind::Llm, Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::Timeout {
                service: ServiceKind::Llm,
                ..
            })
        ));
    }
}
