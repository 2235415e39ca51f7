//! HTML and number parsing for listing, product and review pages
//!
//! The site formats numbers the Turkish way: `.` groups thousands and `,`
//! separates decimals (`1.234,56 TL`).

use super::config::CompiledSelectors;
use super::types::{Price, RawReview, StarCounts};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d.,]*").expect("valid integer regex"));

static PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}(?:\.\d{3})+|\d+)(?:,(\d{1,2}))?").expect("valid price regex")
});

static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid decimal regex"));

/// Parse a displayed count such as `(1.234)` or `1,234 Değerlendirme`
pub fn parse_count(text: &str) -> Option<u32> {
    let digits: String = INTEGER
        .find(text)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Parse a Turkish-formatted price such as `1.234,56 TL`
pub fn parse_price(text: &str) -> Option<Price> {
    let captures = PRICE.captures(text)?;
    let major: i64 = captures[1].replace('.', "").parse().ok()?;
    let minor: i64 = match captures.get(2) {
        Some(m) if m.as_str().len() == 1 => m.as_str().parse::<i64>().ok()? * 10,
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    let currency = if text.contains('€') || text.contains("EUR") {
        "EUR"
    } else if text.contains('$') || text.contains("USD") {
        "USD"
    } else {
        "TRY"
    };

    Some(Price::new(major.checked_mul(100)?.checked_add(minor)?, currency))
}

/// Parse a rating in [0, 5] such as `4,6` or `4.6`
pub fn parse_rating(text: &str) -> Option<f32> {
    let value: f32 = DECIMAL.find(text)?.as_str().replace(',', ".").parse().ok()?;
    (0.0..=5.0).contains(&value).then_some(value)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of an element, preferring a `content` attribute (microdata)
fn element_value(element: ElementRef<'_>) -> String {
    match element.value().attr("content") {
        Some(content) if !content.trim().is_empty() => content.trim().to_string(),
        _ => element_text(element),
    }
}

/// A product tile on a category listing page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingTile {
    pub url: Url,
    pub review_count: u32,
}

/// Extract product tiles from a listing page
///
/// Tiles without a parsable review count or a resolvable link are skipped.
pub fn parse_listing(html: &str, page_url: &Url, selectors: &CompiledSelectors) -> Vec<ListingTile> {
    let document = Html::parse_document(html);
    let mut tiles = Vec::new();

    for card in document.select(&selectors.product_card) {
        let Some(review_count) = card
            .select(&selectors.card_review_count)
            .next()
            .and_then(|el| parse_count(&element_text(el)))
        else {
            debug!("Skipping tile without review count");
            continue;
        };

        let Some(mut url) = card
            .select(&selectors.card_link)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
        else {
            debug!("Skipping tile without product link");
            continue;
        };
        url.set_fragment(None);

        tiles.push(ListingTile { url, review_count });
    }

    tiles
}

/// Core facts read from a product page
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetails {
    pub name: Option<String>,
    pub price: Price,
    pub rating: f32,
    pub review_count: u32,
    pub star_counts: Option<StarCounts>,
}

/// Extract product facts, failing with a reason if a core field is unusable
pub fn parse_product(html: &str, selectors: &CompiledSelectors) -> Result<ProductDetails, String> {
    let document = Html::parse_document(html);

    let first_value = |selector: &Selector, field: &str| -> Result<String, String> {
        document
            .select(selector)
            .next()
            .map(element_value)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| format!("missing {}", field))
    };

    let price_text = first_value(&selectors.product_price, "price")?;
    let price =
        parse_price(&price_text).ok_or_else(|| format!("unparsable price '{}'", price_text))?;

    let rating_text = first_value(&selectors.product_rating, "rating")?;
    let rating =
        parse_rating(&rating_text).ok_or_else(|| format!("unparsable rating '{}'", rating_text))?;

    let count_text = first_value(&selectors.product_review_count, "review count")?;
    let review_count = parse_count(&count_text)
        .ok_or_else(|| format!("unparsable review count '{}'", count_text))?;

    let name = first_value(&selectors.product_name, "name").ok();

    let counts: Vec<u32> = document
        .select(&selectors.star_counts)
        .filter_map(|el| parse_count(&element_value(el)))
        .collect();
    let star_counts = <[u32; 5]>::try_from(counts)
        .ok()
        .map(StarCounts::from_descending);

    Ok(ProductDetails {
        name,
        price,
        rating,
        review_count,
        star_counts,
    })
}

/// Reviews read from one review page
#[derive(Debug, Clone, Default)]
pub struct ReviewPage {
    pub reviews: Vec<RawReview>,

    /// Entries found on the page, including skipped ones
    pub entries: usize,

    /// Entries skipped because they had no text
    pub skipped: usize,
}

/// Extract review entries from a review page
///
/// Entries without text are skipped with a warning; an unparsable per-review
/// rating is recorded as `None`.
pub fn parse_reviews(html: &str, selectors: &CompiledSelectors) -> ReviewPage {
    let document = Html::parse_document(html);
    let mut page = ReviewPage::default();

    for (index, item) in document.select(&selectors.review_item).enumerate() {
        page.entries += 1;

        let text = item
            .select(&selectors.review_text)
            .next()
            .map(element_text)
            .unwrap_or_default();
        if text.is_empty() {
            warn!(index, "Skipping review entry without text");
            page.skipped += 1;
            continue;
        }

        let rating = item
            .select(&selectors.review_rating)
            .next()
            .and_then(|el| parse_rating(&element_value(el)));

        page.reviews.push(RawReview { text, rating });
    }

    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::config::SiteSelectors;

    fn selectors() -> CompiledSelectors {
        SiteSelectors::default().compile().unwrap()
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("(1.234)"), Some(1234));
        assert_eq!(parse_count("(987)"), Some(987));
        assert_eq!(parse_count("12,345 Değerlendirme"), Some(12345));
        assert_eq!(parse_count("()"), None);
        assert_eq!(parse_count("yorum yok"), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("1.234,56 TL"), Some(Price::new(123_456, "TRY")));
        assert_eq!(parse_price("₺ 899,9"), Some(Price::new(89_990, "TRY")));
        assert_eq!(parse_price("12.999 TL"), Some(Price::new(1_299_900, "TRY")));
        assert_eq!(parse_price("45 €"), Some(Price::new(4_500, "EUR")));
        assert_eq!(parse_price("Fiyat yok"), None);
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("4,6"), Some(4.6));
        assert_eq!(parse_rating("4.6 / 5"), Some(4.6));
        assert_eq!(parse_rating("5"), Some(5.0));
        assert_eq!(parse_rating("7,2"), None);
        assert_eq!(parse_rating("puan"), None);
    }

    #[test]
    fn test_parse_listing() {
        let html = r#"
            <ul>
              <li class="productListContent-zAP0Y5msy8OHn5z7T_K_">
                <a href="/laptop-a-p-HB1"><span class="rate-module_count__fjUng">(1.500)</span></a>
              </li>
              <li class="productListContent-zAP0Y5msy8OHn5z7T_K_">
                <a href="https://shop.test/laptop-b-p-HB2#reviews">b</a>
                <span class="rate-module_count__fjUng">(20)</span>
              </li>
              <li class="productListContent-zAP0Y5msy8OHn5z7T_K_">
                <a href="/laptop-c-p-HB3">no count</a>
              </li>
              <li class="productListContent-zAP0Y5msy8OHn5z7T_K_">
                <span class="rate-module_count__fjUng">(3.000)</span>
              </li>
            </ul>
        "#;
        let page_url = Url::parse("https://shop.test/laptops?sayfa=1").unwrap();

        let tiles = parse_listing(html, &page_url, &selectors());
        assert_eq!(
            tiles,
            vec![
                ListingTile {
                    url: Url::parse("https://shop.test/laptop-a-p-HB1").unwrap(),
                    review_count: 1500,
                },
                ListingTile {
                    url: Url::parse("https://shop.test/laptop-b-p-HB2").unwrap(),
                    review_count: 20,
                },
            ]
        );
    }

    #[test]
    fn test_parse_product() {
        let html = r#"
            <h1 data-test-id="title">Laptop X 16GB</h1>
            <div data-test-id="price-current-price">24.999,00 TL</div>
            <span data-test-id="rating-average">4,7</span>
            <span data-test-id="review-count">2.345 Değerlendirme</span>
            <ul data-test-id="star-distribution">
              <li data-test-id="star-count">2.000</li>
              <li data-test-id="star-count">200</li>
              <li data-test-id="star-count">80</li>
              <li data-test-id="star-count">40</li>
              <li data-test-id="star-count">25</li>
            </ul>
        "#;

        let details = parse_product(html, &selectors()).unwrap();
        assert_eq!(details.name.as_deref(), Some("Laptop X 16GB"));
        assert_eq!(details.price, Price::new(2_499_900, "TRY"));
        assert_eq!(details.rating, 4.7);
        assert_eq!(details.review_count, 2345);
        assert_eq!(details.star_counts.map(|c| c.total()), Some(2345));
    }

    #[test]
    fn test_parse_product_missing_price_is_error() {
        let html = r#"
            <h1 data-test-id="title">Laptop X</h1>
            <span data-test-id="rating-average">4,7</span>
            <span data-test-id="review-count">12</span>
        "#;
        let err = parse_product(html, &selectors()).unwrap_err();
        assert!(err.contains("price"), "{}", err);
    }

    #[test]
    fn test_parse_product_out_of_range_rating_is_error() {
        let html = r#"
            <div data-test-id="price-current-price">100 TL</div>
            <span data-test-id="rating-average">9,1</span>
            <span data-test-id="review-count">12</span>
        "#;
        let err = parse_product(html, &selectors()).unwrap_err();
        assert!(err.contains("rating"), "{}", err);
    }

    #[test]
    fn test_parse_reviews_skips_entries_without_text() {
        let html = r#"
            <div itemprop="review">
              <span itemprop="ratingValue" content="5"></span>
              <p itemprop="description">Çok hızlı kargo, ürün harika.</p>
            </div>
            <div itemprop="review">
              <span itemprop="ratingValue" content="4"></span>
              <p itemprop="description">   </p>
            </div>
            <div itemprop="review">
              <span itemprop="ratingValue">yıldız</span>
              <p itemprop="description">Fiyatına göre iyi.</p>
            </div>
        "#;

        let page = parse_reviews(html, &selectors());
        assert_eq!(page.entries, 3);
        assert_eq!(page.skipped, 1);
        assert_eq!(
            page.reviews,
            vec![
                RawReview::new("Çok hızlı kargo, ürün harika.").with_rating(5.0),
                RawReview::new("Fiyatına göre iyi."),
            ]
        );
    }
}
