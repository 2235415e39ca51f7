//! # Store Module
//!
//! libsql persistence for harvested products and their verdicts.
//!
//! Records are keyed by product URL. Saving a product replaces its earlier
//! row and review set in one transaction; saving a summary overwrites the
//! previous verdict. A product is therefore either fully stored or not at all,
//! which is what makes per-product checkpointing safe to resume.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shopsense::store::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new_from_path("shopsense.db").await?;
//! for product in db.list_products().await? {
//!     println!("{} {} ({} reviews)", product.product_ref, product.price, product.stored_reviews);
//! }
//! # Ok(())
//! # }
//! ```

mod database;
mod error;
mod schema;

pub use database::{Database, StoredProduct};
pub use error::DbError;
