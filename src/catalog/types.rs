//! Product and review records produced by the catalog harvesters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// Identity of a product on the source site
///
/// Equality, ordering and hashing use the URL only, so a set of references
/// deduplicates products regardless of the category they were found in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRef {
    /// Canonical product page URL
    pub url: Url,

    /// Category label the product was discovered under
    pub category: String,
}

impl ProductRef {
    pub fn new(url: Url, category: impl Into<String>) -> Self {
        Self {
            url,
            category: category.into(),
        }
    }

    /// URL of the product's first review page
    ///
    /// The query string and fragment are dropped and `suffix` is appended to
    /// the path unless it is already there.
    pub fn reviews_url(&self, suffix: &str) -> Url {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);

        let path = url.path().trim_end_matches('/').to_string();
        if !path.ends_with(suffix) {
            url.set_path(&format!("{}{}", path, suffix));
        }
        url
    }
}

impl PartialEq for ProductRef {
    fn eq(&self, other: &Self) -> bool {
        self.url.as_str() == other.url.as_str()
    }
}

impl Eq for ProductRef {}

impl Hash for ProductRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.as_str().hash(state);
    }
}

impl PartialOrd for ProductRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProductRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.url.as_str().cmp(other.url.as_str())
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Exact price in minor currency units (kuruş for TRY)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub minor_units: i64,
    pub currency: String,
}

impl Price {
    pub fn new(minor_units: i64, currency: impl Into<String>) -> Self {
        Self {
            minor_units,
            currency: currency.into(),
        }
    }

    /// Price as a floating point major-unit amount, for display and sorting
    pub fn as_major(&self) -> f64 {
        self.minor_units as f64 / 100.0
    }
}

impl fmt::Display for Price {
    /// Formats in the site's Turkish style, e.g. `1.234,56 TL`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        let major = (abs / 100).to_string();
        let minor = abs % 100;

        let mut grouped = String::with_capacity(major.len() + major.len() / 3);
        for (i, digit) in major.chars().enumerate() {
            if i > 0 && (major.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(digit);
        }

        let unit = if self.currency == "TRY" {
            "TL"
        } else {
            self.currency.as_str()
        };
        write!(f, "{}{},{:02} {}", sign, grouped, minor, unit)
    }
}

/// Star rating histogram shown on the product page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StarCounts {
    pub five: u32,
    pub four: u32,
    pub three: u32,
    pub two: u32,
    pub one: u32,
}

impl StarCounts {
    /// Build from counts ordered 5★ down to 1★
    pub fn from_descending(counts: [u32; 5]) -> Self {
        Self {
            five: counts[0],
            four: counts[1],
            three: counts[2],
            two: counts[3],
            one: counts[4],
        }
    }

    pub fn total(&self) -> u64 {
        [self.five, self.four, self.three, self.two, self.one]
            .iter()
            .map(|&c| c as u64)
            .sum()
    }
}

/// One customer review as shown on the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReview {
    pub text: String,
    pub rating: Option<f32>,
}

impl RawReview {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rating: None,
        }
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }
}

/// Structured facts and reviews for one product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_ref: ProductRef,

    /// Display name, when the page exposes one
    pub name: Option<String>,

    pub price: Price,

    /// Average rating in [0, 5]
    pub rating: f32,

    /// Review count displayed on the product page
    pub review_count: u32,

    pub star_counts: Option<StarCounts>,

    /// Reviews in page order
    pub reviews: Vec<RawReview>,

    pub harvested_at: DateTime<Utc>,
}
