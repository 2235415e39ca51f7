//! # Review Chunking
//!
//! Greedy partitioning of a product's reviews into chunks whose rendered text
//! (reviews joined by `\n`) fits the generation request size limit. Lengths are
//! counted in characters, not bytes, so Turkish text is measured correctly.
//!
//! Chunks cover the review sequence in order with no overlap or loss. A review
//! longer than the bound on its own is cut to exactly the bound and placed in a
//! chunk flagged `truncated`, so every review contributes to some chunk.

use super::types::Chunk;
use crate::catalog::RawReview;
use tracing::{debug, instrument, warn};

/// Partition `reviews` into chunks of at most `max_chunk_chars` characters
///
/// A bound of zero is treated as one.
#[instrument(skip(reviews), fields(reviews = reviews.len()))]
pub fn partition(reviews: &[RawReview], max_chunk_chars: usize) -> Vec<Chunk> {
    let bound = max_chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<RawReview> = Vec::new();
    let mut current_len = 0usize;
    let mut truncated = false;

    for (position, review) in reviews.iter().enumerate() {
        let mut review = review.clone();
        let mut review_len = review.text.chars().count();
        let oversized = review_len > bound;

        if oversized {
            warn!(
                position,
                length = review_len,
                bound,
                "Review exceeds chunk bound, truncating"
            );
            review.text = review.text.chars().take(bound).collect();
            review_len = bound;
        }

        if !current.is_empty() && current_len + 1 + review_len > bound {
            chunks.push(Chunk {
                index: chunks.len(),
                reviews: std::mem::take(&mut current),
                size_bound: bound,
                truncated,
            });
            current_len = 0;
            truncated = false;
        }

        current_len = if current.is_empty() {
            review_len
        } else {
            current_len + 1 + review_len
        };
        truncated |= oversized;
        current.push(review);
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            reviews: current,
            size_bound: bound,
            truncated,
        });
    }

    debug!(chunks = chunks.len(), bound, "Partitioned reviews");
    chunks
}
