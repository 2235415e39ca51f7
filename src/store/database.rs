//! Database operations for the record store

use crate::catalog::{Price, ProductRecord, ProductRef, RawReview, StarCounts};
use crate::store::error::DbError;
use crate::store::schema;
use crate::summarizer::{AspectBreakdown, FinalSummary, Sentiment};
use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row, Rows, Value};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

/// Listing entry for a stored product, without its review texts
#[derive(Debug, Clone, Serialize)]
pub struct StoredProduct {
    pub product_ref: ProductRef,
    pub name: Option<String>,
    pub price: Price,
    pub rating: f32,
    pub review_count: u32,
    /// Number of review texts actually stored
    pub stored_reviews: u32,
    pub harvested_at: DateTime<Utc>,
    pub has_summary: bool,
}

/// Database manager for products, reviews and summaries
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database manager
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection) -> Result<Self, DbError> {
        schema::initialize_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Create a new database manager from a path
    pub async fn new_from_path(path: &str) -> Result<Self, DbError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| DbError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Execute a custom query with parameters
    pub async fn execute_query<P>(&self, sql: &str, params: P) -> Result<Rows, DbError>
    where
        P: libsql::params::IntoParams,
    {
        self.conn
            .query(sql, params)
            .await
            .map_err(|e| DbError::Query(format!("Failed to execute query: {}", e)))
    }

    /// Store a harvested product, replacing any earlier record and its reviews
    #[instrument(skip(self, record), fields(product = %record.product_ref, reviews = record.reviews.len()))]
    pub async fn save_product(&self, record: &ProductRecord) -> Result<(), DbError> {
        let url = record.product_ref.url.as_str();
        let stars = record.star_counts;

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO products (url, category, name, price_minor, currency, rating, review_count,
                star_5, star_4, star_3, star_2, star_1, harvested_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(url) DO UPDATE SET
             category = excluded.category,
             name = excluded.name,
             price_minor = excluded.price_minor,
             currency = excluded.currency,
             rating = excluded.rating,
             review_count = excluded.review_count,
             star_5 = excluded.star_5,
             star_4 = excluded.star_4,
             star_3 = excluded.star_3,
             star_2 = excluded.star_2,
             star_1 = excluded.star_1,
             harvested_at = excluded.harvested_at",
            params![
                url,
                record.product_ref.category.clone(),
                optional_text(record.name.as_deref()),
                record.price.minor_units,
                record.price.currency.clone(),
                record.rating as f64,
                record.review_count as i64,
                optional_count(stars.map(|s| s.five)),
                optional_count(stars.map(|s| s.four)),
                optional_count(stars.map(|s| s.three)),
                optional_count(stars.map(|s| s.two)),
                optional_count(stars.map(|s| s.one)),
                record.harvested_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DbError::Query(format!("Failed to save product: {}", e)))?;

        tx.execute("DELETE FROM reviews WHERE product_url = ?", params![url])
            .await
            .map_err(|e| DbError::Query(format!("Failed to delete reviews: {}", e)))?;

        for (position, review) in record.reviews.iter().enumerate() {
            let rating = match review.rating {
                Some(rating) => Value::Real(rating as f64),
                None => Value::Null,
            };
            tx.execute(
                "INSERT INTO reviews (product_url, position, text, rating) VALUES (?, ?, ?, ?)",
                params![url, position as i64, review.text.clone(), rating],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to add review: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to commit transaction: {}", e)))?;

        debug!("Product saved");
        Ok(())
    }

    /// Load a product with its reviews in page order
    pub async fn load_product(&self, url: &Url) -> Result<Option<ProductRecord>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, category, name, price_minor, currency, rating, review_count,
                    star_5, star_4, star_3, star_2, star_1, harvested_at
                 FROM products WHERE url = ?",
                params![url.as_str()],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get product: {}", e)))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DbError::Data(format!("Failed to get product: {}", e))),
        };

        let stars = [
            nullable_integer(&row, 7, "star_5")?,
            nullable_integer(&row, 8, "star_4")?,
            nullable_integer(&row, 9, "star_3")?,
            nullable_integer(&row, 10, "star_2")?,
            nullable_integer(&row, 11, "star_1")?,
        ];
        let star_counts = match stars {
            [Some(five), Some(four), Some(three), Some(two), Some(one)] => Some(
                StarCounts::from_descending([five, four, three, two, one].map(|n| n as u32)),
            ),
            _ => None,
        };

        let product_ref = row_to_product_ref(&row, 0, 1)?;
        let reviews = self.load_reviews(url).await?;

        Ok(Some(ProductRecord {
            product_ref,
            name: nullable_text(&row, 2, "name")?,
            price: Price::new(integer(&row, 3, "price_minor")?, text(&row, 4, "currency")?),
            rating: real(&row, 5, "rating")? as f32,
            review_count: integer(&row, 6, "review_count")? as u32,
            star_counts,
            reviews,
            harvested_at: parse_timestamp(&text(&row, 12, "harvested_at")?)?,
        }))
    }

    async fn load_reviews(&self, url: &Url) -> Result<Vec<RawReview>, DbError> {
        let rows = self
            .conn
            .query(
                "SELECT text, rating FROM reviews WHERE product_url = ? ORDER BY position",
                params![url.as_str()],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get reviews: {}", e)))?;

        collect_rows(rows, "reviews", |row| {
            Ok(RawReview {
                text: text(row, 0, "text")?,
                rating: nullable_real(row, 1, "rating")?.map(|r| r as f32),
            })
        })
        .await
    }

    /// All stored products ordered by URL
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<StoredProduct>, DbError> {
        let rows = self
            .conn
            .query(
                "SELECT p.url, p.category, p.name, p.price_minor, p.currency, p.rating,
                    p.review_count, p.harvested_at,
                    (SELECT COUNT(*) FROM reviews r WHERE r.product_url = p.url),
                    EXISTS (SELECT 1 FROM summaries s WHERE s.product_url = p.url)
                 FROM products p
                 ORDER BY p.url",
                params![],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to list products: {}", e)))?;

        collect_rows(rows, "products", |row| {
            Ok(StoredProduct {
                product_ref: row_to_product_ref(row, 0, 1)?,
                name: nullable_text(row, 2, "name")?,
                price: Price::new(integer(row, 3, "price_minor")?, text(row, 4, "currency")?),
                rating: real(row, 5, "rating")? as f32,
                review_count: integer(row, 6, "review_count")? as u32,
                harvested_at: parse_timestamp(&text(row, 7, "harvested_at")?)?,
                stored_reviews: integer(row, 8, "stored_reviews")? as u32,
                has_summary: integer(row, 9, "has_summary")? != 0,
            })
        })
        .await
    }

    /// Store a verdict, overwriting any earlier one for the product
    #[instrument(skip(self, summary), fields(product = %summary.product_ref))]
    pub async fn save_summary(&self, summary: &FinalSummary) -> Result<(), DbError> {
        let aspects = summary.aspects.as_ref();
        let (positive, negative) = match aspects {
            Some(aspects) => (
                Value::Text(aspect_list_json(&aspects.positive_aspects)?),
                Value::Text(aspect_list_json(&aspects.negative_aspects)?),
            ),
            None => (Value::Null, Value::Null),
        };

        self.conn
            .execute(
                "INSERT INTO summaries (product_url, verdict_text, sentiment, reviews_analyzed,
                    chunks_used, chunks_degraded, generated_at, positive_aspects,
                    negative_aspects, price_performance, packaging_quality, shipping_speed)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(product_url) DO UPDATE SET
                 verdict_text = excluded.verdict_text,
                 sentiment = excluded.sentiment,
                 reviews_analyzed = excluded.reviews_analyzed,
                 chunks_used = excluded.chunks_used,
                 chunks_degraded = excluded.chunks_degraded,
                 generated_at = excluded.generated_at,
                 positive_aspects = excluded.positive_aspects,
                 negative_aspects = excluded.negative_aspects,
                 price_performance = excluded.price_performance,
                 packaging_quality = excluded.packaging_quality,
                 shipping_speed = excluded.shipping_speed",
                params![
                    summary.product_ref.url.as_str(),
                    summary.verdict_text.clone(),
                    summary.sentiment.as_str(),
                    summary.reviews_analyzed as i64,
                    summary.chunks_used as i64,
                    summary.chunks_degraded as i64,
                    summary.generated_at.to_rfc3339(),
                    positive,
                    negative,
                    optional_text(aspects.and_then(|a| a.price_performance.as_deref())),
                    optional_text(aspects.and_then(|a| a.packaging_quality.as_deref())),
                    optional_text(aspects.and_then(|a| a.shipping_speed.as_deref())),
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to save summary: {}", e)))?;

        debug!("Summary saved");
        Ok(())
    }

    /// Load the verdict for one product
    pub async fn load_summary(&self, url: &Url) -> Result<Option<FinalSummary>, DbError> {
        let mut rows = self
            .conn
            .query(
                &format!("{} WHERE s.product_url = ?", SUMMARY_SELECT),
                params![url.as_str()],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to get summary: {}", e)))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_summary(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DbError::Data(format!("Failed to get summary: {}", e))),
        }
    }

    /// All stored verdicts ordered by product URL
    #[instrument(skip(self))]
    pub async fn list_summaries(&self) -> Result<Vec<FinalSummary>, DbError> {
        let rows = self
            .conn
            .query(&format!("{} ORDER BY s.product_url", SUMMARY_SELECT), params![])
            .await
            .map_err(|e| DbError::Query(format!("Failed to list summaries: {}", e)))?;

        collect_rows(rows, "summaries", row_to_summary).await
    }
}

const SUMMARY_SELECT: &str = "SELECT s.product_url, COALESCE(p.category, ''), s.verdict_text,
        s.sentiment, s.reviews_analyzed, s.chunks_used, s.chunks_degraded, s.generated_at,
        s.positive_aspects, s.negative_aspects, s.price_performance, s.packaging_quality,
        s.shipping_speed
     FROM summaries s
     LEFT JOIN products p ON p.url = s.product_url";

fn row_to_summary(row: &Row) -> Result<FinalSummary, DbError> {
    Ok(FinalSummary {
        product_ref: row_to_product_ref(row, 0, 1)?,
        verdict_text: text(row, 2, "verdict_text")?,
        sentiment: Sentiment::from_label(&text(row, 3, "sentiment")?),
        reviews_analyzed: integer(row, 4, "reviews_analyzed")? as usize,
        chunks_used: integer(row, 5, "chunks_used")? as usize,
        chunks_degraded: integer(row, 6, "chunks_degraded")? as usize,
        generated_at: parse_timestamp(&text(row, 7, "generated_at")?)?,
        aspects: row_to_aspects(row)?,
    })
}

/// Aspect columns start at 8; a NULL positive list means no breakdown was stored
fn row_to_aspects(row: &Row) -> Result<Option<AspectBreakdown>, DbError> {
    let Some(positive) = nullable_text(row, 8, "positive_aspects")? else {
        return Ok(None);
    };
    let negative = nullable_text(row, 9, "negative_aspects")?.unwrap_or_else(|| "[]".to_string());

    Ok(Some(AspectBreakdown {
        positive_aspects: parse_aspect_list(&positive)?,
        negative_aspects: parse_aspect_list(&negative)?,
        price_performance: nullable_text(row, 10, "price_performance")?,
        packaging_quality: nullable_text(row, 11, "packaging_quality")?,
        shipping_speed: nullable_text(row, 12, "shipping_speed")?,
    }))
}

fn aspect_list_json(items: &[String]) -> Result<String, DbError> {
    serde_json::to_string(items).map_err(|e| DbError::Data(format!("Failed to encode aspects: {}", e)))
}

fn parse_aspect_list(json: &str) -> Result<Vec<String>, DbError> {
    serde_json::from_str(json).map_err(|e| DbError::Data(format!("Invalid stored aspects {}: {}", json, e)))
}

/// Map every row, failing on the first one that cannot be read
async fn collect_rows<T>(
    mut rows: Rows,
    what: &str,
    mut map: impl FnMut(&Row) -> Result<T, DbError>,
) -> Result<Vec<T>, DbError> {
    let mut items = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DbError::Data(format!("Failed to read {}: {}", what, e)))?
    {
        items.push(map(&row)?);
    }
    Ok(items)
}

fn row_to_product_ref(row: &Row, url_idx: i32, category_idx: i32) -> Result<ProductRef, DbError> {
    let url = text(row, url_idx, "url")?;
    let url = Url::parse(&url).map_err(|e| DbError::Data(format!("Invalid stored URL {}: {}", url, e)))?;
    Ok(ProductRef::new(url, text(row, category_idx, "category")?))
}

fn column_value(row: &Row, idx: i32, name: &str) -> Result<Value, DbError> {
    row.get_value(idx)
        .map_err(|e| DbError::Data(format!("Failed to get {}: {}", name, e)))
}

fn text(row: &Row, idx: i32, name: &str) -> Result<String, DbError> {
    nullable_text(row, idx, name)?.ok_or_else(|| DbError::Data(format!("Missing {}", name)))
}

fn integer(row: &Row, idx: i32, name: &str) -> Result<i64, DbError> {
    nullable_integer(row, idx, name)?.ok_or_else(|| DbError::Data(format!("Missing {}", name)))
}

fn real(row: &Row, idx: i32, name: &str) -> Result<f64, DbError> {
    nullable_real(row, idx, name)?.ok_or_else(|| DbError::Data(format!("Missing {}", name)))
}

fn nullable_text(row: &Row, idx: i32, name: &str) -> Result<Option<String>, DbError> {
    match column_value(row, idx, name)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(DbError::Data(format!("Unexpected {} value: {:?}", name, other))),
    }
}

fn nullable_integer(row: &Row, idx: i32, name: &str) -> Result<Option<i64>, DbError> {
    match column_value(row, idx, name)? {
        Value::Null => Ok(None),
        Value::Integer(n) => Ok(Some(n)),
        other => Err(DbError::Data(format!("Unexpected {} value: {:?}", name, other))),
    }
}

fn nullable_real(row: &Row, idx: i32, name: &str) -> Result<Option<f64>, DbError> {
    match column_value(row, idx, name)? {
        Value::Null => Ok(None),
        Value::Real(r) => Ok(Some(r)),
        Value::Integer(n) => Ok(Some(n as f64)),
        other => Err(DbError::Data(format!("Unexpected {} value: {:?}", name, other))),
    }
}

fn optional_text(text: Option<&str>) -> Value {
    match text {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    }
}

fn optional_count(count: Option<u32>) -> Value {
    match count {
        Some(count) => Value::Integer(count as i64),
        None => Value::Null,
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DbError::Data(format!("Invalid timestamp {}: {}", value, e)))
}
