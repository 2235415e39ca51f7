//! Error types for the summarizer module

use crate::error::Error as CrateError;
use crate::fetch::FetchError;
use thiserror::Error;

/// Error type for summarization
#[derive(Debug, Error)]
pub enum SummarizationError {
    /// There is nothing to reduce: no reviews, or every chunk degraded
    #[error("no usable input for {product}: {chunks} chunk(s), all degraded or none")]
    NoUsableInput { product: String, chunks: usize },

    /// The reduction request failed after retries
    #[error("verdict generation failed: {0}")]
    Generation(FetchError),

    /// The model returned only a sentiment line, or nothing usable
    #[error("empty verdict for {product}")]
    EmptyVerdict { product: String },

    /// The run was cancelled
    #[error("summarization cancelled")]
    Cancelled,
}

impl SummarizationError {
    /// Map a fetch failure, keeping cancellation distinct
    pub fn from_fetch(err: FetchError) -> Self {
        if err.is_cancelled() {
            SummarizationError::Cancelled
        } else {
            SummarizationError::Generation(err)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SummarizationError::Cancelled)
    }
}

impl From<SummarizationError> for CrateError {
    fn from(err: SummarizationError) -> Self {
        match err {
            SummarizationError::Cancelled => CrateError::Cancelled,
            other => CrateError::Summarization(other.to_string()),
        }
    }
}
