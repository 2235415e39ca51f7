//! Error types for the shopsense crate

use thiserror::Error;

/// Result type for shopsense operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for shopsense operations
#[derive(Debug, Error)]
pub enum Error {
    /// Resilient fetch error (retries exhausted, permanent failure or cancellation)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Product harvesting error
    #[error("Harvest error: {0}")]
    Harvest(String),

    /// Review summarization error
    #[error("Summarization error: {0}")]
    Summarization(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HarvestError;
    use crate::fetch::FetchError;
    use crate::store::DbError;
    use crate::summarizer::SummarizationError;

    #[test]
    fn test_module_errors_map_to_domain_variants() {
        let err: Error = FetchError::cancelled("https://shop.test/a", 1).into();
        assert!(matches!(err, Error::Cancelled));

        let err: Error = HarvestError::Fetch(FetchError::cancelled("https://shop.test/a", 0)).into();
        assert!(matches!(err, Error::Cancelled));

        let err: Error = SummarizationError::Cancelled.into();
        assert!(matches!(err, Error::Cancelled));

        let err: Error = DbError::Query("no such table".to_string()).into();
        assert!(matches!(err, Error::Database(ref msg) if msg.contains("no such table")));
    }
}
