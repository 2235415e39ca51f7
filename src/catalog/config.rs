//! # Catalog Configuration Module
//!
//! Pagination limits, qualification thresholds and the CSS selectors used to
//! read listing, product and review pages. The site's markup changes over
//! time, so every selector is configuration rather than a constant.

use super::error::HarvestError;
use scraper::Selector;

/// Heading shown on review pages that carry the site's own review summary
pub const DEFAULT_SUMMARY_MARKER: &str = "Değerlendirme özeti";

/// CSS selectors for the source site
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Product tile on a category listing page
    pub product_card: String,

    /// Review count inside a tile, e.g. `(1.234)`
    pub card_review_count: String,

    /// Product link inside a tile
    pub card_link: String,

    /// Product name on the product page
    pub product_name: String,

    /// Current price on the product page
    pub product_price: String,

    /// Average rating on the product page
    pub product_rating: String,

    /// Review count on the product page
    pub product_review_count: String,

    /// Star histogram entries, ordered 5★ to 1★
    pub star_counts: String,

    /// One review entry on a review page
    pub review_item: String,

    /// Review body inside an entry
    pub review_text: String,

    /// Star rating inside an entry
    pub review_rating: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            product_card: "li.productListContent-zAP0Y5msy8OHn5z7T_K_".to_string(),
            card_review_count: "span.rate-module_count__fjUng".to_string(),
            card_link: "a".to_string(),
            product_name: "h1[data-test-id='title']".to_string(),
            product_price: "[data-test-id='price-current-price']".to_string(),
            product_rating: "[data-test-id='rating-average']".to_string(),
            product_review_count: "[data-test-id='review-count']".to_string(),
            star_counts: "[data-test-id='star-distribution'] [data-test-id='star-count']"
                .to_string(),
            review_item: "[itemprop='review']".to_string(),
            review_text: "[itemprop='description']".to_string(),
            review_rating: "[itemprop='ratingValue']".to_string(),
        }
    }
}

/// Parsed form of [`SiteSelectors`]
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub product_card: Selector,
    pub card_review_count: Selector,
    pub card_link: Selector,
    pub product_name: Selector,
    pub product_price: Selector,
    pub product_rating: Selector,
    pub product_review_count: Selector,
    pub star_counts: Selector,
    pub review_item: Selector,
    pub review_text: Selector,
    pub review_rating: Selector,
}

fn compile(selector: &str) -> Result<Selector, HarvestError> {
    Selector::parse(selector).map_err(|e| HarvestError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

impl SiteSelectors {
    /// Parse every selector, failing on the first invalid one
    pub fn compile(&self) -> Result<CompiledSelectors, HarvestError> {
        Ok(CompiledSelectors {
            product_card: compile(&self.product_card)?,
            card_review_count: compile(&self.card_review_count)?,
            card_link: compile(&self.card_link)?,
            product_name: compile(&self.product_name)?,
            product_price: compile(&self.product_price)?,
            product_rating: compile(&self.product_rating)?,
            product_review_count: compile(&self.product_review_count)?,
            star_counts: compile(&self.star_counts)?,
            review_item: compile(&self.review_item)?,
            review_text: compile(&self.review_text)?,
            review_rating: compile(&self.review_rating)?,
        })
    }
}

/// Configuration for link collection and review harvesting
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Minimum displayed review count for a product to qualify
    pub min_review_threshold: u32,

    /// Query parameter carrying the page number
    pub page_param: String,

    /// Maximum listing pages per category
    pub max_pages: u32,

    /// Stop collecting once this many products qualify
    pub max_products: usize,

    /// Path suffix turning a product URL into its review page URL
    pub reviews_suffix: String,

    /// Maximum review pages per product
    pub max_review_pages: u32,

    /// Maximum reviews kept per product
    pub max_reviews_per_product: usize,

    /// When set, a product qualifies only if its review page contains this text
    pub summary_marker: Option<String>,

    pub selectors: SiteSelectors,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            min_review_threshold: 1000,
            page_param: "sayfa".to_string(),
            max_pages: 50,
            max_products: 1000,
            reviews_suffix: "-yorumlari".to_string(),
            max_review_pages: 100,
            max_reviews_per_product: 2000,
            summary_marker: None,
            selectors: SiteSelectors::default(),
        }
    }
}

/// Builder for CatalogConfig
#[derive(Debug, Default)]
pub struct CatalogConfigBuilder {
    config: CatalogConfig,
}

impl CatalogConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CatalogConfig::default(),
        }
    }

    /// Set the minimum review count threshold
    pub fn min_review_threshold(mut self, min_review_threshold: u32) -> Self {
        self.config.min_review_threshold = min_review_threshold;
        self
    }

    /// Set the pagination query parameter
    pub fn page_param(mut self, page_param: impl Into<String>) -> Self {
        self.config.page_param = page_param.into();
        self
    }

    /// Set the maximum listing pages per category
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the maximum number of products to collect
    pub fn max_products(mut self, max_products: usize) -> Self {
        self.config.max_products = max_products;
        self
    }

    /// Set the review page path suffix
    pub fn reviews_suffix(mut self, reviews_suffix: impl Into<String>) -> Self {
        self.config.reviews_suffix = reviews_suffix.into();
        self
    }

    /// Set the maximum review pages per product
    pub fn max_review_pages(mut self, max_review_pages: u32) -> Self {
        self.config.max_review_pages = max_review_pages;
        self
    }

    /// Set the maximum reviews kept per product
    pub fn max_reviews_per_product(mut self, max_reviews_per_product: usize) -> Self {
        self.config.max_reviews_per_product = max_reviews_per_product;
        self
    }

    /// Require the review summary marker on qualifying products
    pub fn summary_marker(mut self, summary_marker: Option<String>) -> Self {
        self.config.summary_marker = summary_marker;
        self
    }

    /// Set the site selectors
    pub fn selectors(mut self, selectors: SiteSelectors) -> Self {
        self.config.selectors = selectors;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CatalogConfig {
        self.config
    }
}

impl CatalogConfig {
    /// Create a new builder
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selectors_compile() {
        assert!(SiteSelectors::default().compile().is_ok());
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let selectors = SiteSelectors {
            review_item: "[[broken".to_string(),
            ..SiteSelectors::default()
        };
        match selectors.compile() {
            Err(HarvestError::InvalidSelector { selector, .. }) => {
                assert_eq!(selector, "[[broken")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
