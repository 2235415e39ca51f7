//! Error types for the catalog module

use crate::error::Error as CrateError;
use crate::fetch::FetchError;
use thiserror::Error;

/// Error type for link collection and product harvesting
#[derive(Debug, Error)]
pub enum HarvestError {
    /// A core product field (price, rating, review count) is missing or unparsable
    #[error("malformed product at {url}: {reason}")]
    MalformedProduct { url: String, reason: String },

    /// A required page could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A configured CSS selector does not parse
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl HarvestError {
    /// Whether this failure was caused by run cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HarvestError::Fetch(e) if e.is_cancelled())
    }
}

impl From<HarvestError> for CrateError {
    fn from(err: HarvestError) -> Self {
        match err {
            HarvestError::Fetch(e) => e.into(),
            HarvestError::InvalidSelector { .. } => CrateError::Config(err.to_string()),
            other => CrateError::Harvest(other.to_string()),
        }
    }
}
