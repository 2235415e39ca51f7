//! Category pagination and product link selection

use super::config::{CatalogConfig, CompiledSelectors};
use super::error::HarvestError;
use super::parse::parse_listing;
use super::types::ProductRef;
use crate::fetch::{PageFetcher, ResilientFetcher};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Counters describing one collection pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    pub categories: usize,
    pub pages: usize,
    pub candidates: usize,
    pub below_threshold: usize,
    pub missing_summary: usize,
    pub page_errors: usize,
}

/// Qualifying products found by [`LinkCollector::collect`]
#[derive(Debug, Clone, Default)]
pub struct LinkCollection {
    pub products: BTreeSet<ProductRef>,
    pub stats: CollectStats,
}

/// Set `param=page` on `base`, replacing any existing value
pub fn paginate(base: &Url, param: &str, page: u32) -> Url {
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(param, &page.to_string());
    url
}

/// Category label derived from the last path segment of a category URL
pub fn category_label(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_else(|| url.host_str().unwrap_or("unknown"))
        .to_string()
}

/// Enumerates category listings and selects products by review count
pub struct LinkCollector<P> {
    pages: P,
    fetcher: ResilientFetcher,
    config: CatalogConfig,
    selectors: CompiledSelectors,
}

impl<P: PageFetcher> LinkCollector<P> {
    /// Create a collector, compiling the configured selectors
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

    /// Collect qualifying products from each category
    ///
    /// A category stops paginating when a page adds no new qualifying product,
    /// when its page bound is reached, or when one of its pages cannot be
    /// fetched. Collection stops entirely once `max_products` is reached.
    /// Only cancellation is returned as an error.
    #[instrument(skip(self, category_urls), fields(categories = category_urls.len()))]
    pub async fn collect(
        &self,
        category_urls: &[Url],
        min_review_threshold: u32,
    ) -> Result<LinkCollection, HarvestError> {
        let mut collection = LinkCollection::default();
        let max_products = self.config.max_products;

        'categories: for category_url in category_urls {
            if collection.products.len() >= max_products {
                break;
            }
            collection.stats.categories += 1;
            let category = category_label(category_url);
            info!(%category_url, %category, "Collecting category");

            for page_number in 1..=self.config.max_pages {
                let page_url = paginate(category_url, &self.config.page_param, page_number);
                let page = match self.fetcher.fetch(&self.pages, &page_url).await {
                    Ok(page) => page,
                    Err(e) if e.is_cancelled() => return Err(e.into()),
                    Err(e) => {
                        warn!(%page_url, error = %e, "Listing page failed, halting category");
                        collection.stats.page_errors += 1;
                        continue 'categories;
                    }
                };
                collection.stats.pages += 1;

                let tiles = parse_listing(&page.body, &page.url, &self.selectors);
                let mut added = 0usize;

                for tile in tiles {
                    collection.stats.candidates += 1;
                    if tile.review_count < min_review_threshold {
                        collection.stats.below_threshold += 1;
                        continue;
                    }

                    let product = ProductRef::new(tile.url, category.clone());
                    if collection.products.contains(&product) {
                        continue;
                    }

                    if let Some(marker) = &self.config.summary_marker {
                        match self.has_review_summary(&product, marker).await {
                            Ok(true) => {}
                            Ok(false) => {
                                debug!(product = %product, "No review summary, skipping");
                                collection.stats.missing_summary += 1;
                                continue;
                            }
                            Err(e) if e.is_cancelled() => return Err(e),
                            Err(e) => {
                                warn!(product = %product, error = %e, "Review page check failed");
                                collection.stats.page_errors += 1;
                                continue;
                            }
                        }
                    }

                    collection.products.insert(product);
                    added += 1;

                    if collection.products.len() >= max_products {
                        info!(max_products, "Reached product limit");
                        break 'categories;
                    }
                }

                debug!(page_number, added, total = collection.products.len(), "Listing page parsed");
                if added == 0 {
                    debug!(page_number, "No new qualifying products, next category");
                    break;
                }
            }
        }

        info!(
            products = collection.products.len(),
            pages = collection.stats.pages,
            page_errors = collection.stats.page_errors,
            "Link collection finished"
        );
        Ok(collection)
    }

    async fn has_review_summary(
        &self,
        product: &ProductRef,
        marker: &str,
    ) -> Result<bool, HarvestError> {
        let url = product.reviews_url(&self.config.reviews_suffix);
        let page = self.fetcher.fetch(&self.pages, &url).await?;
        Ok(page.body.to_lowercase().contains(&marker.to_lowercase()))
    }
}
