//! Product facts and review harvesting

use super::config::{CatalogConfig, CompiledSelectors};
use super::error::HarvestError;
use super::links::paginate;
use super::parse::{parse_product, parse_reviews};
use super::types::{ProductRecord, ProductRef, RawReview};
use crate::fetch::{PageFetcher, ResilientFetcher};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

/// Extracts structured facts and raw reviews for one product
pub struct ReviewHarvester<P> {
    pages: P,
    fetcher: ResilientFetcher,
    config: CatalogConfig,
    selectors: CompiledSelectors,
}

impl<P: PageFetcher> ReviewHarvester<P> {
    /// Create a harvester, compiling the configured selectors
    pub fn new(
        pages: P,
        fetcher: ResilientFetcher,
        config: CatalogConfig,
    ) -> Result<Self, HarvestError> {
        let selectors = config.selectors.compile()?;
        Ok(Self {
            pages,
            fetcher,
            config,
            selectors,
        })
    }

    /// Harvest the product page and its review pages
    ///
    /// Fails with [`HarvestError::MalformedProduct`] when price, rating or
    /// review count cannot be read. Review pages are read until one has no
    /// entries, repeats the previous page, fails to load, or the review cap
    /// is reached.
    #[instrument(skip(self), fields(url = %product.url))]
    pub async fn harvest(&self, product: &ProductRef) -> Result<ProductRecord, HarvestError> {
        let page = self.fetcher.fetch(&self.pages, &product.url).await?;
        let details = parse_product(&page.body, &self.selectors).map_err(|reason| {
            HarvestError::MalformedProduct {
                url: product.url.to_string(),
                reason,
            }
        })?;

        let reviews = self.harvest_reviews(product).await?;
        info!(
            reviews = reviews.len(),
            review_count = details.review_count,
            "Harvested product"
        );

        Ok(ProductRecord {
            product_ref: product.clone(),
            name: details.name,
            price: details.price,
            rating: details.rating,
            review_count: details.review_count,
            star_counts: details.star_counts,
            reviews,
            harvested_at: Utc::now(),
        })
    }

    async fn harvest_reviews(&self, product: &ProductRef) -> Result<Vec<RawReview>, HarvestError> {
        let base = product.reviews_url(&self.config.reviews_suffix);
        let limit = self.config.max_reviews_per_product;
        let mut reviews: Vec<RawReview> = Vec::new();
        let mut previous: Vec<RawReview> = Vec::new();

        for page_number in 1..=self.config.max_review_pages {
            if reviews.len() >= limit {
                break;
            }

            let url = paginate(&base, &self.config.page_param, page_number);
            let page = match self.fetcher.fetch(&self.pages, &url).await {
                Ok(page) => page,
                Err(e) if e.is_cancelled() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        page_number,
                        kept = reviews.len(),
                        error = %e,
                        "Review page failed, keeping reviews collected so far"
                    );
                    break;
                }
            };

            let parsed = parse_reviews(&page.body, &self.selectors);
            if parsed.entries == 0 {
                debug!(page_number, "No review entries, end of reviews");
                break;
            }
            if parsed.skipped > 0 {
                warn!(page_number, skipped = parsed.skipped, "Skipped malformed review entries");
            }
            if !parsed.reviews.is_empty() && parsed.reviews == previous {
                debug!(page_number, "Review page repeats previous page, end of reviews");
                break;
            }

            let remaining = limit - reviews.len();
            reviews.extend(parsed.reviews.iter().take(remaining).cloned());
            previous = parsed.reviews;
        }

        Ok(reviews)
    }
}
