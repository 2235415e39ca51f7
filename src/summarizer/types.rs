//! Chunk, partial and final summary types

use crate::catalog::{ProductRef, RawReview};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall leaning of a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Unknown,
}

impl Sentiment {
    /// Parse a label in English or Turkish (`positive`, `olumlu`, `çok olumsuz`, ...)
    pub fn from_label(label: &str) -> Self {
        let label = label
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        match label.as_str() {
            "positive" | "very positive" | "olumlu" | "çok olumlu" => Sentiment::Positive,
            "neutral" | "mixed" | "nötr" | "notr" => Sentiment::Neutral,
            "negative" | "very negative" | "olumsuz" | "çok olumsuz" => Sentiment::Negative,
            _ => Sentiment::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
            Sentiment::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded, ordered group of reviews sent in one generation request
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position of the chunk in the product's chunk sequence
    pub index: usize,

    /// Reviews in original order; never empty
    pub reviews: Vec<RawReview>,

    /// Maximum characters of the rendered chunk text
    pub size_bound: usize,

    /// Whether a single oversized review was cut to `size_bound`
    pub truncated: bool,
}

impl Chunk {
    /// Review texts joined by newlines
    pub fn text(&self) -> String {
        self.reviews
            .iter()
            .map(|review| review.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Length of [`Chunk::text`] in characters
    pub fn char_len(&self) -> usize {
        let separators = self.reviews.len().saturating_sub(1);
        self.reviews
            .iter()
            .map(|review| review.text.chars().count())
            .sum::<usize>()
            + separators
    }
}

/// Summary of one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSummary {
    pub chunk_index: usize,
    pub text: String,
    pub sentiment: Sentiment,

    /// Generation failed after retries; excluded from reduction
    pub degraded: bool,
}

impl PartialSummary {
    pub fn new(chunk_index: usize, text: impl Into<String>, sentiment: Sentiment) -> Self {
        Self {
            chunk_index,
            text: text.into(),
            sentiment,
            degraded: false,
        }
    }

    /// Placeholder for a chunk whose generation failed
    pub fn degraded(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            text: String::new(),
            sentiment: Sentiment::Unknown,
            degraded: true,
        }
    }
}

/// Recurring strengths and complaints, plus the three topics every verdict covers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AspectBreakdown {
    pub positive_aspects: Vec<String>,
    pub negative_aspects: Vec<String>,
    pub price_performance: Option<String>,
    pub packaging_quality: Option<String>,
    pub shipping_speed: Option<String>,
}

/// Buy / don't-buy verdict for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub product_ref: ProductRef,

    /// Single-paragraph verdict
    pub verdict_text: String,

    pub sentiment: Sentiment,

    /// Present when the model answered in the structured format
    #[serde(default)]
    pub aspects: Option<AspectBreakdown>,

    pub reviews_analyzed: usize,
    pub chunks_used: usize,
    pub chunks_degraded: usize,
    pub generated_at: DateTime<Utc>,
}

/// Generation usage counters for one summarizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    /// Generation requests sent, retries included
    pub requests: u64,

    /// Chunks marked degraded
    pub degraded_chunks: u64,
}
