//! # Fetch Module
//!
//! Resilient access to remote services. Every outbound request in the crate,
//! page loads and text-generation calls alike, goes through a
//! [`ResilientFetcher`], which applies:
//!
//! - a shared minimum-interval [`RequestThrottle`] per remote service
//! - bounded retries with exponential [`BackoffPolicy`] and jitter
//! - failure classification via the [`Classify`] trait
//! - cooperative cancellation of throttle and backoff waits
//!
//! ## Example
//!
//! ```rust,no_run
//! use shopsense::fetch::{FetchConfig, HttpPageFetcher, ResilientFetcher};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! async fn example() -> shopsense::Result<()> {
//!     let config = FetchConfig::default();
//!     let pages = HttpPageFetcher::new(&config)
//!         .map_err(|e| shopsense::Error::Config(e.to_string()))?;
//!     let fetcher = ResilientFetcher::from_config(&config, CancellationToken::new());
//!
//!     let url = Url::parse("https://www.hepsiburada.com/laptop-notebook-dizustu-bilgisayarlar-c-98")
//!         .map_err(|e| shopsense::Error::Config(e.to_string()))?;
//!     let page = fetcher.fetch(&pages, &url).await?;
//!     println!("{} bytes", page.body.len());
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod page;
pub mod resilient;
pub mod throttle;

pub use backoff::BackoffPolicy;
pub use config::{FetchConfig, FetchConfigBuilder};
pub use error::{Classify, FailureClass, FetchError, FetchErrorKind, PageError};
pub use page::{FixturePageFetcher, HttpPageFetcher, Page, PageFetcher};
pub use resilient::ResilientFetcher;
pub use throttle::RequestThrottle;
