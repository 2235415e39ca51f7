//! # Summarizer Configuration Module
//!
//! Chunk and reduction size bounds, output token limits and generation pacing for the
//! chunked summarizer.

use std::time::Duration;

/// Configuration for the chunked summarizer
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Maximum characters of review text per chunk request
    pub max_chunk_chars: usize,

    /// Maximum characters of partial-summary text in the reduction request
    pub max_reduction_chars: usize,

    /// Output token limit for chunk summaries
    pub chunk_max_tokens: u64,

    /// Output token limit for the final verdict
    pub reduction_max_tokens: u64,

    /// Minimum interval in milliseconds between generation requests
    pub llm_min_interval_ms: u64,

    /// Provider-side quota for generation requests
    pub llm_requests_per_minute: u32,

    /// Model identifier passed to the provider
    pub model: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 8000,
            max_reduction_chars: 32_000,
            chunk_max_tokens: 500,
            reduction_max_tokens: 800,
            llm_min_interval_ms: 1500,
            llm_requests_per_minute: 30,
            model: crate::model::DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

/// Builder for SummarizerConfig
#[derive(Debug, Default)]
pub struct SummarizerConfigBuilder {
    config: SummarizerConfig,
}

impl SummarizerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: SummarizerConfig::default(),
        }
    }

    /// Set the chunk size bound in characters (at least 1)
    pub fn max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.config.max_chunk_chars = max_chunk_chars.max(1);
        self
    }

    /// Set the reduction prompt bound in characters (at least 1)
    pub fn max_reduction_chars(mut self, max_reduction_chars: usize) -> Self {
        self.config.max_reduction_chars = max_reduction_chars.max(1);
        self
    }

    /// Set the chunk summary token limit
    pub fn chunk_max_tokens(mut self, chunk_max_tokens: u64) -> Self {
        self.config.chunk_max_tokens = chunk_max_tokens;
        self
    }

    /// Set the verdict token limit
    pub fn reduction_max_tokens(mut self, reduction_max_tokens: u64) -> Self {
        self.config.reduction_max_tokens = reduction_max_tokens;
        self
    }

    /// Set the minimum interval between generation requests in milliseconds
    pub fn llm_min_interval_ms(mut self, llm_min_interval_ms: u64) -> Self {
        self.config.llm_min_interval_ms = llm_min_interval_ms;
        self
    }

    /// Set the provider request quota per minute
    pub fn llm_requests_per_minute(mut self, llm_requests_per_minute: u32) -> Self {
        self.config.llm_requests_per_minute = llm_requests_per_minute;
        self
    }

    /// Set the model identifier
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> SummarizerConfig {
        self.config
    }
}

impl SummarizerConfig {
    /// Create a new builder
    pub fn builder() -> SummarizerConfigBuilder {
        SummarizerConfigBuilder::new()
    }

    /// Get the generation request interval as a Duration
    pub fn llm_min_interval(&self) -> Duration {
        Duration::from_millis(self.llm_min_interval_ms)
    }
}
