//! # Summarizer Module
//!
//! Compresses an unbounded number of reviews into one buy / don't-buy verdict
//! while respecting the text-generation request size limit.
//!
//! ## Stages
//!
//! 1. `partition`: greedy, order-preserving chunking by character bound
//! 2. `summarize_chunk`: one generation request per chunk; failures degrade
//!    the chunk instead of failing the product
//! 3. `reduce`: one request over the non-degraded partial summaries, in chunk
//!    order, producing a single-paragraph verdict
//!
//! Model output is not deterministic, but prompt construction and chunk
//! ordering are.

mod chunking;
mod config;
mod error;
pub mod prompts;
mod summarize;
mod types;

pub use chunking::partition;
pub use config::{SummarizerConfig, SummarizerConfigBuilder};
pub use error::SummarizationError;
pub use summarize::ChunkedSummarizer;
pub use types::{AspectBreakdown, Chunk, FinalSummary, PartialSummary, Sentiment, UsageStats};
