//! Error types for the fetch module

use crate::error::Error as CrateError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How the retry loop treats a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Expected to resolve on retry (timeouts, 429, 5xx, anti-bot challenges)
    Transient,
    /// Malformed payload. Retried, but surfaced as permanent once attempts run out.
    Malformed,
    /// Will not resolve on retry
    Permanent,
}

/// Classification of operation errors for [`ResilientFetcher`](super::ResilientFetcher)
pub trait Classify {
    /// The failure class of this error
    fn failure_class(&self) -> FailureClass;

    /// A server-requested wait before the next attempt, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Kind of a surfaced fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Retries exhausted on transient failures
    Transient,
    /// Non-retryable failure, or a malformed payload that persisted
    Permanent,
    /// The run was cancelled while waiting
    Cancelled,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Transient => write!(f, "transient"),
            FetchErrorKind::Permanent => write!(f, "permanent"),
            FetchErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure of one logical fetch, after the retry policy has been applied
#[derive(Debug, Clone, Error)]
#[error("{kind} failure for {target} after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    /// Kind of failure
    pub kind: FetchErrorKind,

    /// URL or label of the operation
    pub target: String,

    /// Number of attempts actually made
    pub attempts: u32,

    /// Description of the last underlying error
    pub cause: String,
}

impl FetchError {
    /// Create a cancellation error
    pub fn cancelled(target: impl Into<String>, attempts: u32) -> Self {
        Self {
            kind: FetchErrorKind::Cancelled,
            target: target.into(),
            attempts,
            cause: "run cancelled".to_string(),
        }
    }

    /// Whether this failure was caused by run cancellation
    pub fn is_cancelled(&self) -> bool {
        self.kind == FetchErrorKind::Cancelled
    }
}

impl From<FetchError> for CrateError {
    fn from(err: FetchError) -> Self {
        if err.is_cancelled() {
            CrateError::Cancelled
        } else {
            CrateError::Fetch(err.to_string())
        }
    }
}

/// Error from a single page fetch attempt
#[derive(Debug, Error)]
pub enum PageError {
    /// Network-level failure (connection reset, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP status {status} for {url}")]
    Status {
        /// Status code
        status: u16,
        /// Requested URL
        url: String,
        /// Parsed Retry-After header
        retry_after: Option<Duration>,
    },

    /// The site served an anti-bot challenge instead of content
    #[error("anti-bot challenge at {url} (matched '{marker}')")]
    Challenge {
        /// Requested URL
        url: String,
        /// The marker that matched
        marker: String,
    },

    /// The response body is unusable
    #[error("malformed response from {url}: {reason}")]
    Malformed {
        /// Requested URL
        url: String,
        /// What was wrong
        reason: String,
    },

    /// No page is known for the URL
    #[error("no page for {0}")]
    NotFound(String),

    /// The HTTP client could not be configured
    #[error("client configuration error: {0}")]
    Client(String),
}

impl Classify for PageError {
    fn failure_class(&self) -> FailureClass {
        match self {
            PageError::Http(e) if e.is_builder() => FailureClass::Permanent,
            PageError::Http(_) => FailureClass::Transient,
            PageError::Status { status, .. } => match status {
                408 | 429 | 500..=599 => FailureClass::Transient,
                _ => FailureClass::Permanent,
            },
            PageError::Challenge { .. } => FailureClass::Transient,
            PageError::Malformed { .. } => FailureClass::Malformed,
            PageError::NotFound(_) | PageError::Client(_) => FailureClass::Permanent,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            PageError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
