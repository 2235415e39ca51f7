use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rig::completion::{self, CompletionError, CompletionModel, CompletionRequest, CompletionResponse};
use tracing::{debug_span, info_span, Instrument};

/// Raw provider response passed through the rate limiter
pub struct RateLimitResponse<T> {
    #[allow(dead_code)]
    response: T,
}

/// Completion model that waits for a governor quota before every request
#[derive(Clone)]
pub struct RateLimitedCompletionModel<M: CompletionModel> {
    model: M,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<M> RateLimitedCompletionModel<M>
where
    M: CompletionModel,
{
    pub fn new(model: M, limiter: DefaultDirectRateLimiter) -> Self {
        Self {
            model,
            limiter: Arc::new(limiter),
        }
    }

    /// Allow at most `requests` per minute
    pub fn per_minute(model: M, requests: NonZeroU32) -> Self {
        Self::new(model, RateLimiter::direct(Quota::per_minute(requests)))
    }
}

impl<M: CompletionModel> CompletionModel for RateLimitedCompletionModel<M> {
    type Response = RateLimitResponse<M::Response>;

    async fn completion(
        &self,
        completion_request: CompletionRequest,
    ) -> Result<completion::CompletionResponse<Self::Response>, CompletionError> {
        self.limiter.until_ready().instrument(debug_span!("limiter")).await;
        let response = self
            .model
            .completion(completion_request)
            .instrument(info_span!("completion"))
            .await;
        response.map(|response| CompletionResponse {
            choice: response.choice,
            raw_response: RateLimitResponse {
                response: response.raw_response,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{response_text, MockCompletionModel};

    #[tokio::test]
    async fn test_passes_through_model_response() {
        let mock = MockCompletionModel::new();
        mock.push_text("Kargo hızlı, ürün sağlam.").await;
        let model = RateLimitedCompletionModel::per_minute(
            mock.clone(),
            NonZeroU32::new(60).unwrap(),
        );

        let response = model
            .completion_request("yorumlar".to_string())
            .send()
            .await
            .unwrap();

        assert_eq!(response_text(&response.choice), "Kargo hızlı, ürün sağlam.");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_passes_through_model_error() {
        let mock = MockCompletionModel::new();
        mock.push_error("503 Service Unavailable").await;
        let model = RateLimitedCompletionModel::per_minute(mock, NonZeroU32::new(60).unwrap());

        let result = model.completion_request("yorumlar".to_string()).send().await;
        assert!(matches!(result, Err(CompletionError::ProviderError(_))));
    }
}
