//! Run outcomes and progress events

use crate::catalog::{CollectStats, ProductRef};
use crate::summarizer::{FinalSummary, Sentiment, UsageStats};
use serde::Serialize;
use std::fmt;

/// Stage at which a product failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Harvest,
    Store,
    Summarize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Harvest => write!(f, "harvest"),
            Stage::Store => write!(f, "store"),
            Stage::Summarize => write!(f, "summarize"),
        }
    }
}

/// A product that did not make it through the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ProductFailure {
    pub product_ref: ProductRef,
    pub stage: Stage,
    pub reason: String,
}

impl ProductFailure {
    pub fn new(product_ref: &ProductRef, stage: Stage, reason: impl ToString) -> Self {
        Self {
            product_ref: product_ref.clone(),
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Outcome of one run
///
/// Summaries are in processing order. A cancelled run still reports
/// everything completed before cancellation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Link collection statistics, when the run started from categories
    pub collection: Option<CollectStats>,

    /// Products harvested and stored
    pub harvested: usize,

    pub summaries: Vec<FinalSummary>,

    pub failures: Vec<ProductFailure>,

    pub cancelled: bool,

    pub usage: UsageStats,
}

/// Progress notifications sent while a run is in flight
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Link collection finished with this many qualifying products
    Collected { products: usize },

    /// Work on a product began; `index` counts from zero
    ProductStarted {
        index: usize,
        total: usize,
        product_ref: ProductRef,
    },

    Harvested {
        product_ref: ProductRef,
        reviews: usize,
    },

    Summarized {
        product_ref: ProductRef,
        sentiment: Sentiment,
    },

    Failed(ProductFailure),

    /// The run stopped at a product boundary because it was cancelled
    Cancelled,

    Finished {
        summaries: usize,
        failures: usize,
    },
}
