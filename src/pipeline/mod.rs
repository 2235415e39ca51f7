//! # Pipeline Module
//!
//! Sequences link collection, review harvesting, persistence and
//! summarization for a run.
//!
//! ## Checkpointing
//!
//! Each product is stored right after it is harvested and its verdict right
//! after it is generated. Re-running over the same products overwrites both,
//! so runs are safe to repeat.
//!
//! ## Cancellation
//!
//! [`RunControl::stop`] ends the run at the next product boundary after the
//! product in flight is stored. [`RunControl::abort`] also interrupts that
//! product; nothing of it is written.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shopsense::fetch::{FetchConfig, HttpPageFetcher};
//! use shopsense::model::gemini_from_env;
//! use shopsense::pipeline::{Pipeline, PipelineConfig, RunControl};
//! use shopsense::store::Database;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let pages = HttpPageFetcher::new(&config.fetch)?;
//! let model = gemini_from_env(&config.summarizer.model, config.summarizer.llm_requests_per_minute)?;
//! let db = Database::new_from_path("shopsense.db").await?;
//!
//! let pipeline = Pipeline::new(pages, model, db, config, RunControl::new())?;
//! let report = pipeline
//!     .run(&[Url::parse("https://www.hepsiburada.com/laptop-notebook-dizustu-bilgisayarlar-c-98")?])
//!     .await?;
//! println!("{} verdicts, {} failures", report.summaries.len(), report.failures.len());
//! # Ok(())
//! # }
//! ```

mod config;
mod control;
mod orchestrator;
mod report;

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use control::RunControl;
pub use orchestrator::Pipeline;
pub use report::{PipelineEvent, ProductFailure, RunReport, Stage};
