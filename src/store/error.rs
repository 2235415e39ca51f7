//! # Store Error Types
//!
//! Failure modes of the libsql record store. Every variant carries the
//! underlying libsql message, so callers only need the category.

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// SQL query error
    #[error("SQL query error: {0}")]
    Query(String),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(String),

    /// A stored value could not be read back
    #[error("Data error: {0}")]
    Data(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl From<DbError> for CrateError {
    fn from(err: DbError) -> Self {
        CrateError::Database(err.to_string())
    }
}
