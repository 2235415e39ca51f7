//! # Database Schema Module
//!
//! Three tables keyed by product URL:
//! 1. `products` - one row per harvested product, overwritten on re-harvest
//! 2. `reviews` - review texts in page order, replaced with their product
//! 3. `summaries` - at most one verdict per product, with its optional aspect
//!    breakdown (aspect lists are JSON arrays)
//!
//! The column layout is what external dashboards read, so renames here are
//! breaking changes.

use crate::store::error::DbError;
use libsql::{Connection, params};

/// Create tables and indexes if they do not exist
pub async fn initialize_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS products (
            url TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            name TEXT,
            price_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            rating REAL NOT NULL,
            review_count INTEGER NOT NULL,
            star_5 INTEGER,
            star_4 INTEGER,
            star_3 INTEGER,
            star_2 INTEGER,
            star_1 INTEGER,
            harvested_at TEXT NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create products table: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_url TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            rating REAL,
            FOREIGN KEY (product_url) REFERENCES products(url) ON DELETE CASCADE
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create reviews table: {}", e)))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reviews_product_url ON reviews(product_url, position)",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create index on reviews: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS summaries (
            product_url TEXT PRIMARY KEY,
            verdict_text TEXT NOT NULL,
            sentiment TEXT NOT NULL,
            reviews_analyzed INTEGER NOT NULL,
            chunks_used INTEGER NOT NULL,
            chunks_degraded INTEGER NOT NULL,
            generated_at TEXT NOT NULL,
            positive_aspects TEXT,
            negative_aspects TEXT,
            price_performance TEXT,
            packaging_quality TEXT,
            shipping_speed TEXT
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create summaries table: {}", e)))?;

    for column in ASPECT_COLUMNS {
        add_missing_column(conn, "summaries", column).await?;
    }

    Ok(())
}

/// Nullable aspect columns added after the first release of `summaries`
const ASPECT_COLUMNS: [&str; 5] = [
    "positive_aspects",
    "negative_aspects",
    "price_performance",
    "packaging_quality",
    "shipping_speed",
];

/// Add a nullable TEXT column to databases created before it existed
async fn add_missing_column(conn: &Connection, table: &str, column: &str) -> Result<(), DbError> {
    let mut rows = conn
        .query(
            "SELECT 1 FROM pragma_table_info(?) WHERE name = ?",
            params![table, column],
        )
        .await
        .map_err(|e| DbError::Schema(format!("Failed to inspect {}: {}", table, e)))?;

    let exists = rows
        .next()
        .await
        .map_err(|e| DbError::Schema(format!("Failed to inspect {}: {}", table, e)))?
        .is_some();
    if exists {
        return Ok(());
    }

    conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} TEXT"), params![])
        .await
        .map_err(|e| DbError::Schema(format!("Failed to add {}.{}: {}", table, column, e)))?;
    Ok(())
}
