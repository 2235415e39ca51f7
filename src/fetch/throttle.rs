//! Minimum-interval request throttle
//!
//! One throttle instance is shared (via `Arc`) by every call site that talks to
//! the same remote service. The "last request" timestamp is the only shared
//! mutable state and is held behind a single async mutex, so concurrent callers
//! are serialized and the configured request rate is never exceeded.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum interval between outbound requests
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    /// Create a throttle with the given minimum interval. Zero disables waiting.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Create a throttle allowing at most `requests` per minute
    pub fn per_minute(requests: u32) -> Self {
        if requests == 0 {
            return Self::new(Duration::ZERO);
        }
        Self::new(Duration::from_secs(60) / requests)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until `min_interval` has passed since the previous request, then
    /// record the current request.
    pub async fn throttle(&self) {
        let mut last_request = self.last_request.lock().await;

        if let Some(previous) = *last_request {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Throttling outbound request"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_not_delayed() {
        let throttle = RequestThrottle::new(Duration::from_secs(2));
        let start = Instant::now();
        throttle.throttle().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_are_spaced() {
        let throttle = RequestThrottle::new(Duration::from_secs(2));
        let start = Instant::now();
        throttle.throttle().await;
        throttle.throttle().await;
        throttle.throttle().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_interval_already_elapsed() {
        let throttle = RequestThrottle::new(Duration::from_secs(2));
        throttle.throttle().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let start = Instant::now();
        throttle.throttle().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_across_tasks() {
        let throttle = Arc::new(RequestThrottle::new(Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let throttle = throttle.clone();
                tokio::spawn(async move { throttle.throttle().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // Four requests need three full intervals between them
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn test_per_minute() {
        assert_eq!(
            RequestThrottle::per_minute(30).min_interval(),
            Duration::from_secs(2)
        );
        assert_eq!(RequestThrottle::per_minute(0).min_interval(), Duration::ZERO);
    }
}
