//! # Text Generation Model Module
//!
//! Text-generation models used by the summarizer, wrapped with governor-based
//! rate limiting, plus the failure classification that lets the retry loop in
//! [`crate::fetch::ResilientFetcher`] tell rate limits from invalid requests.
//!
//! ## Key Components
//!
//! - `RateLimitedCompletionModel`: adds a request quota to any completion model
//! - `MockCompletionModel`: scripted model for tests and offline runs
//! - `gemini_from_env`: Gemini model configured from `GEMINI_API_KEY`

use std::num::NonZeroU32;
use std::sync::LazyLock;

use governor::{Quota, RateLimiter};
use regex::Regex;
use rig::completion::{AssistantContent, CompletionError};
use rig::one_or_many::OneOrMany;
use rig::providers::gemini;

use crate::error::{Error, Result};
use crate::fetch::{Classify, FailureClass};

pub mod mock_model;
pub mod ratelimited_completion;

pub use mock_model::MockCompletionModel;
pub use ratelimited_completion::RateLimitedCompletionModel;

/// Default Gemini model for review summarization
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Create a rate-limited Gemini completion model from `GEMINI_API_KEY`
pub fn gemini_from_env(
    model_name: &str,
    requests_per_minute: u32,
) -> Result<RateLimitedCompletionModel<gemini::completion::CompletionModel>> {
    let quota = NonZeroU32::new(requests_per_minute)
        .ok_or_else(|| Error::Config("requests per minute must be greater than zero".into()))?;
    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| Error::Config("GEMINI_API_KEY environment variable must be set".into()))?;
    let client = gemini::Client::new(&api_key);

    Ok(RateLimitedCompletionModel::new(
        client.completion_model(model_name),
        RateLimiter::direct(Quota::per_minute(quota)),
    ))
}

/// Join the text parts of a model response
pub fn response_text(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .map(|content| match content {
            AssistantContent::Text(t) => t.text.clone(),
            _ => "".to_string(),
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Provider error statuses that no retry can fix
const PERMANENT_STATUSES: &[&str] = &[
    "invalid_argument",
    "failed_precondition",
    "permission_denied",
    "unauthenticated",
    "not_found",
];

/// Wording used by providers for overload and quota failures
const TRANSIENT_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "resource_exhausted",
    "too many requests",
    "overloaded",
    "unavailable",
    "deadline_exceeded",
    "timed out",
    "timeout",
];

/// An HTTP status at the start of the message or after `status`/`HTTP`
static STATUS_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^\s*|\bstatus(?:\s+code)?\s*[:=]?\s*|\bhttp\s+)([1-5]\d{2})\b")
        .expect("valid status code regex")
});

/// Classify a provider message, or `None` when it says nothing about retrying
fn classify_message(message: &str) -> Option<FailureClass> {
    let lowered = message.to_lowercase();
    if PERMANENT_STATUSES.iter().any(|status| lowered.contains(status)) {
        return Some(FailureClass::Permanent);
    }

    if let Some(code) = STATUS_CODE
        .captures(&lowered)
        .and_then(|captures| captures[1].parse::<u16>().ok())
    {
        return Some(match code {
            408 | 429 | 500..=599 => FailureClass::Transient,
            _ => FailureClass::Permanent,
        });
    }

    TRANSIENT_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
        .then_some(FailureClass::Transient)
}

impl Classify for CompletionError {
    fn failure_class(&self) -> FailureClass {
        match self {
            CompletionError::HttpError(e) if e.is_builder() => FailureClass::Permanent,
            CompletionError::HttpError(_) => FailureClass::Transient,
            CompletionError::ProviderError(msg) => {
                classify_message(msg).unwrap_or(FailureClass::Permanent)
            }
            CompletionError::ResponseError(msg) => {
                classify_message(msg).unwrap_or(FailureClass::Malformed)
            }
            CompletionError::JsonError(_) => FailureClass::Malformed,
            _ => FailureClass::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_rate_limit_is_transient() {
        let err = CompletionError::ProviderError(
            "429 Too Many Requests: RESOURCE_EXHAUSTED".to_string(),
        );
        assert_eq!(err.failure_class(), FailureClass::Transient);

        let err = CompletionError::ProviderError("The model is overloaded".to_string());
        assert_eq!(err.failure_class(), FailureClass::Transient);
    }

    #[test]
    fn test_invalid_request_is_permanent() {
        let err = CompletionError::ProviderError("400 INVALID_ARGUMENT: bad prompt".to_string());
        assert_eq!(err.failure_class(), FailureClass::Permanent);
    }

    #[test]
    fn test_status_codes_match_whole_tokens() {
        let err = CompletionError::ProviderError(
            "400 INVALID_ARGUMENT: input token count 15000 exceeds the maximum".to_string(),
        );
        assert_eq!(err.failure_class(), FailureClass::Permanent);

        let err = CompletionError::ProviderError(
            "invalid request: prompt must be under 5000 characters".to_string(),
        );
        assert_eq!(err.failure_class(), FailureClass::Permanent);

        let err = CompletionError::ProviderError("request failed with status code: 503".to_string());
        assert_eq!(err.failure_class(), FailureClass::Transient);

        let err = CompletionError::ResponseError("HTTP 502 Bad Gateway".to_string());
        assert_eq!(err.failure_class(), FailureClass::Transient);
    }

    #[test]
    fn test_unusable_response_is_malformed() {
        let err = CompletionError::ResponseError("Response contained no message".to_string());
        assert_eq!(err.failure_class(), FailureClass::Malformed);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let choice = OneOrMany::many(vec![
            AssistantContent::text("first"),
            AssistantContent::text("second"),
        ])
        .unwrap();
        assert_eq!(response_text(&choice), "first\nsecond");
    }

    #[test]
    fn test_gemini_from_env_rejects_zero_quota() {
        assert!(matches!(
            gemini_from_env(DEFAULT_GEMINI_MODEL, 0),
            Err(Error::Config(_))
        ));
    }
}
