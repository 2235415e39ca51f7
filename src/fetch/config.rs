//! # Fetch Configuration Module
//!
//! Retry, backoff and politeness settings shared by every outbound request.
//! Uses the same builder pattern as the other configuration types in the crate.

use super::backoff::BackoffPolicy;
use std::time::Duration;

/// Configuration for resilient fetching
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum attempts per logical fetch (including the first)
    pub max_attempts: u32,

    /// Backoff base delay in milliseconds
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,

    /// Jitter as a fraction of the computed delay
    pub jitter: f64,

    /// Minimum interval in milliseconds between requests to the same site
    pub min_request_interval_ms: u64,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Accept-Language header value
    pub accept_language: String,

    /// Case-insensitive body markers that identify an anti-bot challenge page
    pub challenge_markers: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter: 0.2,
            min_request_interval_ms: 2000,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            // Interstitial fingerprints only; ordinary pages may embed a captcha widget
            challenge_markers: vec![
                "cf-chl".to_string(),
                "challenge-platform".to_string(),
                "px-captcha".to_string(),
                "captcha-delivery.com".to_string(),
                "_incapsula_resource".to_string(),
            ],
        }
    }
}

/// Builder for FetchConfig
#[derive(Debug, Default)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: FetchConfig::default(),
        }
    }

    /// Set the maximum attempts per fetch (at least 1)
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the backoff base delay in milliseconds
    pub fn base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.config.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the backoff ceiling in milliseconds
    pub fn max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.config.max_delay_ms = max_delay_ms;
        self
    }

    /// Set the jitter fraction
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.config.jitter = jitter;
        self
    }

    /// Set the minimum interval between requests in milliseconds
    pub fn min_request_interval_ms(mut self, min_request_interval_ms: u64) -> Self {
        self.config.min_request_interval_ms = min_request_interval_ms;
        self
    }

    /// Set the per-request timeout in seconds
    pub fn request_timeout_secs(mut self, request_timeout_secs: u64) -> Self {
        self.config.request_timeout_secs = request_timeout_secs;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the Accept-Language header
    pub fn accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.config.accept_language = accept_language.into();
        self
    }

    /// Set the anti-bot challenge markers
    pub fn challenge_markers(mut self, challenge_markers: Vec<String>) -> Self {
        self.config.challenge_markers = challenge_markers;
        self
    }

    /// Build the configuration
    pub fn build(self) -> FetchConfig {
        self.config
    }
}

impl FetchConfig {
    /// Create a new builder
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::new()
    }

    /// The backoff policy described by this configuration
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
        .with_jitter(self.jitter)
    }

    /// Get the minimum request interval as a Duration
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    /// Get the request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.min_request_interval(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.backoff_policy().base_delay(), Duration::from_secs(1));
        assert_eq!(config.backoff_policy().max_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_builder_clamps_attempts() {
        let config = FetchConfig::builder().max_attempts(0).build();
        assert_eq!(config.max_attempts, 1);
    }
}
