//! Chunk, summarize and reduce

use super::chunking::partition;
use super::config::SummarizerConfig;
use super::error::SummarizationError;
use super::prompts::{
    chunk_prompt, extract_sentiment, majority_sentiment, parse_verdict, reduction_prompt,
    CHUNK_PREAMBLE, REDUCTION_PREAMBLE,
};
use super::types::{Chunk, FinalSummary, PartialSummary, Sentiment, UsageStats};
use crate::catalog::{ProductRef, RawReview};
use crate::fetch::{FetchError, ResilientFetcher};
use crate::model::response_text;
use chrono::Utc;
use rig::completion::{CompletionError, CompletionModel};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, instrument, warn};

/// Summarizes an unbounded review set within the model's request size limit
///
/// Reviews are partitioned into bounded chunks, each chunk is summarized
/// separately, and the partial summaries are reduced into one verdict. Every
/// generation request goes through the given [`ResilientFetcher`], which
/// should carry the text-generation throttle rather than the site throttle.
pub struct ChunkedSummarizer<M> {
    model: M,
    fetcher: ResilientFetcher,
    config: SummarizerConfig,
    requests: AtomicU64,
    degraded_chunks: AtomicU64,
}

impl<M> ChunkedSummarizer<M> {
    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Generation usage so far
    pub fn usage(&self) -> UsageStats {
        UsageStats {
            requests: self.requests.load(Ordering::Relaxed),
            degraded_chunks: self.degraded_chunks.load(Ordering::Relaxed),
        }
    }
}

impl<M: CompletionModel> ChunkedSummarizer<M> {
    pub fn new(model: M, fetcher: ResilientFetcher, config: SummarizerConfig) -> Self {
        Self {
            model,
            fetcher,
            config,
            requests: AtomicU64::new(0),
            degraded_chunks: AtomicU64::new(0),
        }
    }

    /// Partition reviews using the configured chunk bound
    pub fn partition(&self, reviews: &[RawReview]) -> Vec<Chunk> {
        partition(reviews, self.config.max_chunk_chars)
    }

    /// Summarize one chunk
    ///
    /// A chunk whose generation fails after retries comes back degraded.
    /// Only cancellation is returned as an error.
    #[instrument(skip(self, chunk), fields(chunk = chunk.index, reviews = chunk.reviews.len()))]
    pub async fn summarize_chunk(&self, chunk: &Chunk) -> Result<PartialSummary, SummarizationError> {
        let label = format!("chunk {}", chunk.index);
        let result = self
            .generate(
                &label,
                CHUNK_PREAMBLE,
                chunk_prompt(chunk),
                self.config.chunk_max_tokens,
            )
            .await;

        match result {
            Ok(output) => {
                let (text, sentiment) = extract_sentiment(&output);
                debug!(%sentiment, chars = text.len(), "Chunk summarized");
                Ok(PartialSummary::new(chunk.index, text, sentiment))
            }
            Err(e) if e.is_cancelled() => Err(SummarizationError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Chunk summarization failed, marking degraded");
                self.degraded_chunks.fetch_add(1, Ordering::Relaxed);
                Ok(PartialSummary::degraded(chunk.index))
            }
        }
    }

    /// Reduce partial summaries into a single-paragraph verdict
    ///
    /// The aspect breakdown is filled in when the model answers with the
    /// requested JSON object. Fails with [`SummarizationError::NoUsableInput`] without contacting the
    /// model when every partial is degraded.
    #[instrument(skip(self, partials), fields(product = %product_ref, partials = partials.len()))]
    pub async fn reduce(
        &self,
        product_ref: &ProductRef,
        partials: &[PartialSummary],
        reviews_analyzed: usize,
    ) -> Result<FinalSummary, SummarizationError> {
        let usable: Vec<&PartialSummary> = partials.iter().filter(|p| !p.degraded).collect();
        if usable.is_empty() {
            warn!("No usable partial summaries");
            return Err(SummarizationError::NoUsableInput {
                product: product_ref.to_string(),
                chunks: partials.len(),
            });
        }

        let label = format!("reduce {}", product_ref);
        let output = self
            .generate(
                &label,
                REDUCTION_PREAMBLE,
                reduction_prompt(partials, self.config.max_reduction_chars),
                self.config.reduction_max_tokens,
            )
            .await
            .map_err(SummarizationError::from_fetch)?;

        let verdict = parse_verdict(&output);
        if verdict.text.is_empty() {
            return Err(SummarizationError::EmptyVerdict {
                product: product_ref.to_string(),
            });
        }
        if verdict.aspects.is_none() {
            debug!("Verdict was plain text, no aspect breakdown");
        }

        let sentiment = match verdict.sentiment {
            Sentiment::Unknown => majority_sentiment(usable.iter().copied()),
            known => known,
        };

        Ok(FinalSummary {
            product_ref: product_ref.clone(),
            verdict_text: verdict.text,
            sentiment,
            aspects: verdict.aspects,
            reviews_analyzed,
            chunks_used: usable.len(),
            chunks_degraded: partials.len() - usable.len(),
            generated_at: Utc::now(),
        })
    }

    /// Partition, summarize each chunk in order, then reduce
    #[instrument(skip(self, reviews), fields(product = %product_ref, reviews = reviews.len()))]
    pub async fn summarize(
        &self,
        product_ref: &ProductRef,
        reviews: &[RawReview],
    ) -> Result<FinalSummary, SummarizationError> {
        if reviews.is_empty() {
            return Err(SummarizationError::NoUsableInput {
                product: product_ref.to_string(),
                chunks: 0,
            });
        }

        let chunks = self.partition(reviews);
        info!(chunks = chunks.len(), "Summarizing reviews");

        let mut partials = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            if self.fetcher.is_cancelled() {
                return Err(SummarizationError::Cancelled);
            }
            partials.push(self.summarize_chunk(chunk).await?);
        }

        let summary = self.reduce(product_ref, &partials, reviews.len()).await?;
        info!(
            sentiment = %summary.sentiment,
            chunks_used = summary.chunks_used,
            chunks_degraded = summary.chunks_degraded,
            "Verdict generated"
        );
        Ok(summary)
    }

    async fn generate(
        &self,
        label: &str,
        preamble: &str,
        prompt: String,
        max_tokens: u64,
    ) -> Result<String, FetchError> {
        self.fetcher
            .retry(label, || {
                let prompt = prompt.clone();
                async move {
                    self.requests.fetch_add(1, Ordering::Relaxed);
                    let response = self
                        .model
                        .completion_request(prompt)
                        .preamble(preamble.to_string())
                        .max_tokens(max_tokens)
                        .send()
                        .await?;

                    let text = response_text(&response.choice);
                    if text.trim().is_empty() {
                        return Err(CompletionError::ResponseError(
                            "empty model response".to_string(),
                        ));
                    }
                    Ok::<String, CompletionError>(text)
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{BackoffPolicy, RequestThrottle};
    use crate::model::MockCompletionModel;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    fn summarizer(model: MockCompletionModel, max_chunk_chars: usize) -> ChunkedSummarizer<MockCompletionModel> {
        let fetcher = ResilientFetcher::new(
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(100)),
            2,
            Arc::new(RequestThrottle::new(Duration::ZERO)),
            CancellationToken::new(),
        );
        let config = SummarizerConfig::builder()
            .max_chunk_chars(max_chunk_chars)
            .build();
        ChunkedSummarizer::new(model, fetcher, config)
    }

    fn product() -> ProductRef {
        ProductRef::new(Url::parse("https://shop.test/laptop-x-p-HBC1").unwrap(), "laptops")
    }

    fn reviews() -> Vec<RawReview> {
        ["a", "b", "c"]
            .iter()
            .map(|letter| RawReview::new(letter.repeat(50)))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_summarize_chunks_then_reduces() {
        let model = MockCompletionModel::new();
        model.push_text("Performans iyi.\nSENTIMENT: positive").await;
        model.push_text("Isınma sorunu var.\nSENTIMENT: negative").await;
        model
            .push_text(
                r#"{"verdict": "Genel olarak tavsiye edilir. Kargo hızlı.",
                    "positive_aspects": ["Performans"], "negative_aspects": ["Isınma"],
                    "price_performance": "Fiyatına göre iyi", "shipping_speed": "Hızlı",
                    "sentiment": "positive"}"#,
            )
            .await;
        let summarizer = summarizer(model.clone(), 120);

        let summary = summarizer.summarize(&product(), &reviews()).await.unwrap();

        assert_eq!(summary.verdict_text, "Genel olarak tavsiye edilir. Kargo hızlı.");
        assert_eq!(summary.sentiment, Sentiment::Positive);
        let aspects = summary.aspects.unwrap();
        assert_eq!(aspects.positive_aspects, vec!["Performans"]);
        assert_eq!(aspects.negative_aspects, vec!["Isınma"]);
        assert_eq!(aspects.packaging_quality, None);
        assert_eq!(summary.reviews_analyzed, 3);
        assert_eq!(summary.chunks_used, 2);
        assert_eq!(summary.chunks_degraded, 0);
        assert_eq!(model.calls(), 3);
        assert_eq!(summarizer.usage().requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_chunk_is_excluded() {
        let model = MockCompletionModel::new();
        model.push_error("503 Service Unavailable").await;
        model.push_error("503 Service Unavailable").await;
        model.push_text("Isınma sorunu var.\nSENTIMENT: negative").await;
        model.push_text("Alınmamalı.").await;
        let summarizer = summarizer(model.clone(), 120);

        let summary = summarizer.summarize(&product(), &reviews()).await.unwrap();

        assert_eq!(summary.chunks_used, 1);
        assert_eq!(summary.chunks_degraded, 1);
        // No sentiment line in the verdict, falls back to the partials
        assert_eq!(summary.sentiment, Sentiment::Negative);
        assert_eq!(summary.aspects, None);
        assert_eq!(summarizer.usage().degraded_chunks, 1);
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_chunks_degraded_is_no_usable_input() {
        let model = MockCompletionModel::new();
        model.push_error("400 INVALID_ARGUMENT").await;
        model.push_error("400 INVALID_ARGUMENT").await;
        let summarizer = summarizer(model.clone(), 120);

        let err = summarizer.summarize(&product(), &reviews()).await.unwrap_err();

        assert!(matches!(err, SummarizationError::NoUsableInput { chunks: 2, .. }));
        // Permanent errors are not retried and no reduction request is sent
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reduce_all_degraded_sends_nothing() {
        let model = MockCompletionModel::new();
        let summarizer = summarizer(model.clone(), 120);
        let partials = vec![PartialSummary::degraded(0), PartialSummary::degraded(1)];

        let err = summarizer.reduce(&product(), &partials, 10).await.unwrap_err();

        assert!(matches!(err, SummarizationError::NoUsableInput { .. }));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reduction_is_generation_error() {
        let model = MockCompletionModel::new();
        model.push_error("400 INVALID_ARGUMENT").await;
        let summarizer = summarizer(model, 120);
        let partials = vec![PartialSummary::new(0, "iyi", Sentiment::Positive)];

        let err = summarizer.reduce(&product(), &partials, 1).await.unwrap_err();
        assert!(matches!(err, SummarizationError::Generation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_reviews_is_no_usable_input() {
        let model = MockCompletionModel::new();
        let summarizer = summarizer(model.clone(), 120);

        let err = summarizer.summarize(&product(), &[]).await.unwrap_err();
        assert!(matches!(err, SummarizationError::NoUsableInput { chunks: 0, .. }));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_summarization() {
        let model = MockCompletionModel::new();
        let summarizer = summarizer(model.clone(), 120);
        summarizer.fetcher.cancellation_token().cancel();

        let err = summarizer.summarize(&product(), &reviews()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_model_response_degrades_chunk() {
        let model = MockCompletionModel::new();
        let summarizer = summarizer(model.clone(), 1000);

        let chunks = summarizer.partition(&reviews());
        let partial = summarizer.summarize_chunk(&chunks[0]).await.unwrap();

        assert!(partial.degraded);
        // Empty output is retried as malformed before degrading
        assert_eq!(model.calls(), 2);
    }
}
