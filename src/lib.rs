//! # shopsense - Review Harvesting and Verdict Generation
//!
//! This crate finds heavily reviewed products on a Turkish e-commerce site,
//! harvests their reviews through a throttled, retrying fetch layer, and
//! compresses thousands of reviews into a single buy / don't-buy verdict with
//! a chunked summarize-then-reduce flow over a text-generation model.
//!
//! ## Features
//!
//! - Resilient page fetching:
//!   - Minimum spacing between site requests
//!   - Exponential backoff with jitter, honoring `Retry-After`
//!   - Transient / malformed / permanent failure classification
//!   - Cancellation of every wait
//! - Category crawling with a review-count threshold
//! - Product facts (name, exact price, rating, star distribution) and reviews
//! - Bounded-size chunking and degraded-chunk tolerant summarization
//! - libsql persistence with per-product checkpoints
//! - Async API with Tokio
//!
//! ## Example
//!
//! ```rust,no_run
//! use shopsense::catalog::{ProductRef, RawReview};
//! use shopsense::fetch::{FetchConfig, ResilientFetcher};
//! use shopsense::model::gemini_from_env;
//! use shopsense::summarizer::{ChunkedSummarizer, SummarizerConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SummarizerConfig::default();
//!     let model = gemini_from_env(&config.model, config.llm_requests_per_minute)?;
//!     let fetcher = ResilientFetcher::from_config(&FetchConfig::default(), CancellationToken::new());
//!     let summarizer = ChunkedSummarizer::new(model, fetcher, config);
//!
//!     let product = ProductRef::new(Url::parse("https://www.hepsiburada.com/laptop-x-p-HBC1")?, "laptops");
//!     let reviews = vec![RawReview::new("Çok hızlı, fiyatına göre harika.")];
//!     let summary = summarizer.summarize(&product, &reviews).await?;
//!
//!     println!("{}: {}", summary.sentiment, summary.verdict_text);
//!     Ok(())
//! }
//! ```

mod error;

pub mod catalog;
pub mod fetch;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod summarizer;

pub use error::{Error, Result};

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::catalog::{ProductRecord, ProductRef, RawReview};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::pipeline::{Pipeline, PipelineConfig, RunReport};
    pub use crate::summarizer::{FinalSummary, Sentiment};
}
