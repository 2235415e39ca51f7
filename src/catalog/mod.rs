//! # Catalog Module
//!
//! Reads the source site: category listings, product pages and review pages.
//!
//! ## Key Components
//!
//! - `LinkCollector`: paginates category listings and selects products whose
//!   displayed review count meets a threshold
//! - `ReviewHarvester`: reads price, rating, review count and review text for
//!   one product
//! - `CatalogConfig` / `SiteSelectors`: pagination limits and CSS selectors
//!
//! All network access goes through [`crate::fetch::ResilientFetcher`], so
//! throttling, retries and cancellation behave the same for every page.
//! Markup changes surface as [`HarvestError::MalformedProduct`] instead of
//! zeroed fields.

mod config;
mod error;
mod harvest;
mod links;
pub mod parse;
mod types;

pub use config::{
    CatalogConfig, CatalogConfigBuilder, CompiledSelectors, SiteSelectors,
    DEFAULT_SUMMARY_MARKER,
};
pub use error::HarvestError;
pub use harvest::ReviewHarvester;
pub use links::{category_label, paginate, CollectStats, LinkCollection, LinkCollector};
pub use types::{Price, ProductRecord, ProductRef, RawReview, StarCounts};
