//! # Mock Completion Model
//!
//! Provides a `MockCompletionModel` that implements the `CompletionModel` trait
//! without making API calls. Responses are scripted: queued texts and errors
//! are returned in order, then the default response is returned forever.

use rig::{
    completion::{
        AssistantContent, CompletionError, CompletionModel, CompletionRequest, CompletionResponse,
    },
    one_or_many::OneOrMany,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A scripted completion model for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct MockCompletionModel {
    /// Responses returned before falling back to the default. Errors become provider errors.
    script: Arc<Mutex<VecDeque<Result<String, String>>>>,

    /// Response returned once the script is exhausted
    response: Arc<Mutex<Option<OneOrMany<AssistantContent>>>>,

    calls: Arc<AtomicUsize>,
}

impl MockCompletionModel {
    /// Creates a mock that returns an empty text response
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default response
    pub async fn set_response(&self, response: OneOrMany<AssistantContent>) {
        let mut guard = self.response.lock().await;
        *guard = Some(response);
    }

    /// Sets a plain text default response
    pub async fn set_text_response(&self, text: &str) {
        self.set_response(OneOrMany::one(AssistantContent::text(text)))
            .await;
    }

    /// Queue a successful text response
    pub async fn push_text(&self, text: &str) {
        self.script.lock().await.push_back(Ok(text.to_string()));
    }

    /// Queue a provider error
    pub async fn push_error(&self, message: &str) {
        self.script.lock().await.push_back(Err(message.to_string()));
    }

    /// Number of completion calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionModel for MockCompletionModel {
    type Response = String;

    async fn completion(
        &self,
        _completion_request: CompletionRequest,
    ) -> Result<CompletionResponse<Self::Response>, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.script.lock().await.pop_front();
        let choice = match scripted {
            Some(Ok(text)) => OneOrMany::one(AssistantContent::text(text)),
            Some(Err(message)) => return Err(CompletionError::ProviderError(message)),
            None => {
                let guard = self.response.lock().await;
                guard
                    .clone()
                    .unwrap_or_else(|| OneOrMany::one(AssistantContent::text("")))
            }
        };

        Ok(CompletionResponse {
            choice,
            raw_response: "".to_string(),
        })
    }
}
