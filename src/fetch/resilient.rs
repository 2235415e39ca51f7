//! Retrying, throttled, cancellable execution of remote operations

use super::backoff::BackoffPolicy;
use super::config::FetchConfig;
use super::error::{Classify, FailureClass, FetchError, FetchErrorKind};
use super::page::{Page, PageFetcher};
use super::throttle::RequestThrottle;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, warn};
use url::Url;

/// Wraps remote operations with throttling, bounded retries and backoff
///
/// Every attempt waits on the shared [`RequestThrottle`] first. Transient and
/// malformed failures are retried up to `max_attempts` times in total with
/// exponential backoff; permanent failures return immediately. Throttle and
/// backoff waits are interrupted by the cancellation token.
#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    policy: BackoffPolicy,
    max_attempts: u32,
    throttle: Arc<RequestThrottle>,
    cancel: CancellationToken,
}

impl ResilientFetcher {
    pub fn new(
        policy: BackoffPolicy,
        max_attempts: u32,
        throttle: Arc<RequestThrottle>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            policy,
            max_attempts: max_attempts.max(1),
            throttle,
            cancel,
        }
    }

    /// Create a fetcher from configuration with its own site throttle
    pub fn from_config(config: &FetchConfig, cancel: CancellationToken) -> Self {
        Self::new(
            config.backoff_policy(),
            config.max_attempts,
            Arc::new(RequestThrottle::new(config.min_request_interval())),
            cancel,
        )
    }

    /// Same retry policy and cancellation, different throttle
    pub fn with_throttle(&self, throttle: Arc<RequestThrottle>) -> Self {
        Self {
            throttle,
            ..self.clone()
        }
    }

    /// Same retry policy and throttle, different cancellation token
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetch a page through `fetcher` under the retry policy
    #[instrument(skip(self, fetcher), fields(url = %url))]
    pub async fn fetch<P: PageFetcher>(&self, fetcher: &P, url: &Url) -> Result<Page, FetchError> {
        self.retry(url.as_str(), || fetcher.fetch_page(url)).await
    }

    /// Run `operation` under the retry policy
    ///
    /// `target` names the operation in errors and logs.
    pub async fn retry<T, E, F, Fut>(&self, target: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let mut attempts = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::cancelled(target, attempts));
            }

            tokio::select! {
                _ = self.throttle.throttle() => {}
                _ = self.cancel.cancelled() => {
                    return Err(FetchError::cancelled(target, attempts));
                }
            }

            if self.cancel.is_cancelled() {
                return Err(FetchError::cancelled(target, attempts));
            }

            attempts += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let class = err.failure_class();
            if class == FailureClass::Permanent {
                warn!(operation = target, attempts, error = %err, "Permanent failure, not retrying");
                return Err(FetchError {
                    kind: FetchErrorKind::Permanent,
                    target: target.to_string(),
                    attempts,
                    cause: err.to_string(),
                });
            }

            if attempts >= self.max_attempts {
                let kind = match class {
                    FailureClass::Malformed => FetchErrorKind::Permanent,
                    _ => FetchErrorKind::Transient,
                };
                error!(operation = target, attempts, error = %err, "Retries exhausted");
                return Err(FetchError {
                    kind,
                    target: target.to_string(),
                    attempts,
                    cause: err.to_string(),
                });
            }

            let mut delay = self.policy.next_delay(attempts - 1);
            if let Some(retry_after) = err.retry_after() {
                delay = delay.max(retry_after.min(self.policy.max_delay()));
            }

            warn!(
                operation = target,
                attempt = attempts,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, backing off"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {
                    return Err(FetchError::cancelled(target, attempts));
                }
            }
        }
    }
}
