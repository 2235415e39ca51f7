//! Prompt construction and response normalization
//!
//! Prompt text is built only from its inputs, in chunk-index order, so the same
//! partial summaries always produce the same reduction request.

use super::types::{AspectBreakdown, Chunk, PartialSummary, Sentiment};
use serde::Deserialize;
use tracing::warn;

/// Instruction sent with every chunk request
pub const CHUNK_PREAMBLE: &str = "You summarize customer reviews of a single product \
from a Turkish e-commerce site. Using only the reviews provided, write a short and \
objective summary in Turkish that covers the overall assessment, strengths, weaknesses, \
price/performance, packaging quality and shipping speed. Finish with one final line of \
the form `SENTIMENT: positive`, `SENTIMENT: neutral` or `SENTIMENT: negative`.";

/// Instruction sent with the reduction request
pub const REDUCTION_PREAMBLE: &str = "You are given partial summaries, each written \
from a different group of customer reviews of the same product. Combine them into one \
assessment in Turkish. Answer ONLY with a JSON object of this shape and nothing else: \
{\"verdict\": \"one paragraph telling a shopper whether to buy the product and why, \
weighing recurring strengths against recurring complaints\", \"positive_aspects\": \
[\"...\"], \"negative_aspects\": [\"...\"], \"price_performance\": \"...\", \
\"packaging_quality\": \"...\", \"shipping_speed\": \"...\", \"sentiment\": \
\"positive | neutral | negative\"}";

const SENTIMENT_PREFIX: &str = "sentiment:";
const REDUCTION_HEADER: &str = "Partial summaries:\n\n";
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Prompt for one chunk
pub fn chunk_prompt(chunk: &Chunk) -> String {
    format!(
        "Reviews (group {}, {} reviews):\n{}",
        chunk.index + 1,
        chunk.reviews.len(),
        chunk.text()
    )
}

/// Prompt for the reduction request
///
/// Degraded partials are skipped; the rest are ordered by chunk index
/// regardless of input order. The prompt stays within `max_chars` characters
/// as long as the bound exceeds its fixed headings: short partials are kept
/// whole and the remaining room is split evenly among the longer ones, which
/// are cut to their share.
pub fn reduction_prompt(partials: &[PartialSummary], max_chars: usize) -> String {
    let mut usable: Vec<&PartialSummary> = partials.iter().filter(|p| !p.degraded).collect();
    usable.sort_by_key(|p| p.chunk_index);

    let headings: Vec<String> = usable
        .iter()
        .map(|p| format!("Summary {}:\n", p.chunk_index + 1))
        .collect();
    let texts: Vec<&str> = usable.iter().map(|p| p.text.trim()).collect();

    let overhead = REDUCTION_HEADER.chars().count()
        + SECTION_SEPARATOR.chars().count() * usable.len().saturating_sub(1)
        + headings.iter().map(|h| h.chars().count()).sum::<usize>();
    let lengths: Vec<usize> = texts.iter().map(|t| t.chars().count()).collect();
    let shares = fair_shares(&lengths, max_chars.saturating_sub(overhead));

    let sections: Vec<String> = headings
        .iter()
        .zip(&texts)
        .zip(&shares)
        .zip(&lengths)
        .map(|(((heading, text), &share), &length)| {
            if share < length {
                warn!(length, kept = share, "Partial summary cut to fit the reduction prompt");
                format!("{heading}{}", text.chars().take(share).collect::<String>())
            } else {
                format!("{heading}{text}")
            }
        })
        .collect();

    format!("{REDUCTION_HEADER}{}", sections.join(SECTION_SEPARATOR))
}

/// Split `budget` over items of the given lengths, shortest first
///
/// No item gets more than its length; ties keep input order.
fn fair_shares(lengths: &[usize], budget: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by_key(|&i| (lengths[i], i));

    let mut shares = vec![0; lengths.len()];
    let mut remaining = budget;
    for (placed, &i) in order.iter().enumerate() {
        let share = lengths[i].min(remaining / (lengths.len() - placed));
        shares[i] = share;
        remaining -= share;
    }
    shares
}

/// Verdict fields as the model writes them
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VerdictFields {
    #[serde(alias = "overall_summary")]
    verdict: String,
    positive_aspects: Vec<String>,
    negative_aspects: Vec<String>,
    price_performance: Option<String>,
    packaging_quality: Option<String>,
    shipping_speed: Option<String>,
    sentiment: Option<String>,
}

/// Reduction output after parsing
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub text: String,
    pub sentiment: Sentiment,
    pub aspects: Option<AspectBreakdown>,
}

/// Read the reduction output
///
/// A JSON object (bare or inside a code fence) yields the verdict paragraph,
/// its sentiment and an [`AspectBreakdown`]. Anything else is read as plain
/// text with an optional trailing `SENTIMENT:` line and no breakdown.
pub fn parse_verdict(output: &str) -> Verdict {
    let fields = json_object(output).and_then(|json| serde_json::from_str::<VerdictFields>(json).ok());
    let Some(fields) = fields else {
        let (body, sentiment) = extract_sentiment(output);
        return Verdict {
            text: normalize_paragraph(&body),
            sentiment,
            aspects: None,
        };
    };

    Verdict {
        text: normalize_paragraph(&fields.verdict),
        sentiment: fields
            .sentiment
            .as_deref()
            .map(Sentiment::from_label)
            .unwrap_or(Sentiment::Unknown),
        aspects: Some(AspectBreakdown {
            positive_aspects: clean_list(fields.positive_aspects),
            negative_aspects: clean_list(fields.negative_aspects),
            price_performance: clean_field(fields.price_performance),
            packaging_quality: clean_field(fields.packaging_quality),
            shipping_speed: clean_field(fields.shipping_speed),
        }),
    }
}

/// Outermost `{...}` span of `output`
fn json_object(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (start < end).then(|| &output[start..=end])
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| normalize_paragraph(&item))
        .filter(|item| !item.is_empty())
        .collect()
}

fn clean_field(value: Option<String>) -> Option<String> {
    value
        .map(|value| normalize_paragraph(&value))
        .filter(|value| !value.is_empty())
}

/// Split model output into its body and trailing sentiment label
///
/// The last `SENTIMENT:` line wins and is removed from the body. Output
/// without one yields [`Sentiment::Unknown`].
pub fn extract_sentiment(output: &str) -> (String, Sentiment) {
    let mut sentiment = Sentiment::Unknown;
    let mut body = Vec::new();

    for line in output.lines() {
        let cleaned = line.trim().trim_matches(|c: char| c == '*' || c == '`').trim();
        match cleaned.get(..SENTIMENT_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(SENTIMENT_PREFIX) => {
                sentiment = Sentiment::from_label(&cleaned[SENTIMENT_PREFIX.len()..]);
            }
            _ => body.push(line),
        }
    }

    (body.join("\n").trim().to_string(), sentiment)
}

/// Collapse model output into one paragraph, dropping code fences
pub fn normalize_paragraph(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("```"))
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Most common known sentiment among partials; ties resolve to neutral
pub fn majority_sentiment<'a>(partials: impl IntoIterator<Item = &'a PartialSummary>) -> Sentiment {
    let (mut positive, mut neutral, mut negative) = (0usize, 0usize, 0usize);
    for partial in partials {
        match partial.sentiment {
            Sentiment::Positive => positive += 1,
            Sentiment::Neutral => neutral += 1,
            Sentiment::Negative => negative += 1,
            Sentiment::Unknown => {}
        }
    }

    if positive + neutral + negative == 0 {
        Sentiment::Unknown
    } else if positive > neutral && positive > negative {
        Sentiment::Positive
    } else if negative > neutral && negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}
