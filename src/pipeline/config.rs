//! # Pipeline Configuration Module
//!
//! Groups the per-stage configurations so one value can drive a whole run.

use crate::catalog::CatalogConfig;
use crate::fetch::FetchConfig;
use crate::summarizer::SummarizerConfig;

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Retry, pacing and HTTP settings for site requests
    pub fetch: FetchConfig,

    /// Listing and review harvesting settings
    pub catalog: CatalogConfig,

    /// Chunking and generation settings
    pub summarizer: SummarizerConfig,

    /// Summarize each product after harvesting it
    pub summarize: bool,

    /// Capacity of the progress event channel
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            catalog: CatalogConfig::default(),
            summarizer: SummarizerConfig::default(),
            summarize: true,
            event_buffer: 64,
        }
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn fetch(mut self, fetch: FetchConfig) -> Self {
        self.config.fetch = fetch;
        self
    }

    pub fn catalog(mut self, catalog: CatalogConfig) -> Self {
        self.config.catalog = catalog;
        self
    }

    pub fn summarizer(mut self, summarizer: SummarizerConfig) -> Self {
        self.config.summarizer = summarizer;
        self
    }

    /// Harvest only when false
    pub fn summarize(mut self, summarize: bool) -> Self {
        self.config.summarize = summarize;
        self
    }

    /// Set the progress channel capacity (at least 1)
    pub fn event_buffer(mut self, event_buffer: usize) -> Self {
        self.config.event_buffer = event_buffer.max(1);
        self
    }

    /// Build the configuration
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl PipelineConfig {
    /// Create a new builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}
