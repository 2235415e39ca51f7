//! Single-attempt page fetching
//!
//! [`PageFetcher`] is the seam between the resilience layer and the network.
//! [`HttpPageFetcher`] talks to the live site; [`FixturePageFetcher`] serves
//! canned pages and scripted failures so collectors and harvesters can be
//! exercised without network access.

use super::config::FetchConfig;
use super::error::PageError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client as ReqwestClient;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: String,
}

/// Performs one fetch attempt, without retries or throttling
pub trait PageFetcher: Send + Sync {
    fn fetch_page(&self, url: &Url) -> impl Future<Output = Result<Page, PageError>> + Send;
}

/// Return the first challenge marker found in `body`, compared case-insensitively
pub fn detect_challenge<'a>(body: &str, markers: &'a [String]) -> Option<&'a str> {
    let lowered = body.to_lowercase();
    markers
        .iter()
        .find(|marker| !marker.is_empty() && lowered.contains(&marker.to_lowercase()))
        .map(String::as_str)
}

/// Fetches pages from the live site with browser-like headers
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: ReqwestClient,
    challenge_markers: Vec<String>,
}

impl HttpPageFetcher {
    /// Create a fetcher from the fetch configuration
    pub fn new(config: &FetchConfig) -> Result<Self, PageError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| PageError::Client(format!("invalid user agent: {}", e)))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| PageError::Client(format!("invalid accept-language: {}", e)))?,
        );

        let client = ReqwestClient::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PageError::Client(e.to_string()))?;

        Ok(Self {
            client,
            challenge_markers: config.challenge_markers.clone(),
        })
    }
}

impl PageFetcher for HttpPageFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_page(&self, url: &Url) -> Result<Page, PageError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(PageError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                retry_after,
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(PageError::Malformed {
                url: url.to_string(),
                reason: "empty body".to_string(),
            });
        }

        if let Some(marker) = detect_challenge(&body, &self.challenge_markers) {
            return Err(PageError::Challenge {
                url: url.to_string(),
                marker: marker.to_string(),
            });
        }

        debug!(status = status.as_u16(), bytes = body.len(), "Fetched page");
        Ok(Page {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Default)]
struct FixtureEntry {
    failures: VecDeque<u16>,
    body: Option<String>,
    calls: usize,
}

/// Serves canned pages keyed by URL
///
/// Each URL may have a queue of failure statuses that are returned, in order,
/// before its body is served. Unknown URLs fail with [`PageError::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct FixturePageFetcher {
    entries: Arc<Mutex<HashMap<String, FixtureEntry>>>,
    calls: Arc<AtomicUsize>,
}

fn fixture_key(url: &str) -> String {
    Url::parse(url)
        .map(|parsed| parsed.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl FixturePageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`
    pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
        self.insert(url, |entry| entry.body = Some(html.into()));
        self
    }

    /// Fail with the given HTTP statuses, in order, before serving the page
    pub fn with_failures(self, url: &str, statuses: &[u16]) -> Self {
        self.insert(url, |entry| entry.failures.extend(statuses.iter().copied()));
        self
    }

    /// Total number of fetch attempts served
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of fetch attempts for one URL
    pub fn calls_for(&self, url: &str) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.get(&fixture_key(url)).map_or(0, |e| e.calls))
            .unwrap_or(0)
    }

    fn insert(&self, url: &str, update: impl FnOnce(&mut FixtureEntry)) {
        if let Ok(mut entries) = self.entries.lock() {
            update(entries.entry(fixture_key(url)).or_default());
        }
    }
}

impl PageFetcher for FixturePageFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<Page, PageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PageError::Client("fixture state poisoned".to_string()))?;
        let entry = entries
            .get_mut(url.as_str())
            .ok_or_else(|| PageError::NotFound(url.to_string()))?;
        entry.calls += 1;

        if let Some(status) = entry.failures.pop_front() {
            return Err(PageError::Status {
                status,
                url: url.to_string(),
                retry_after: None,
            });
        }

        match &entry.body {
            Some(body) => Ok(Page {
                url: url.clone(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(PageError::NotFound(url.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn fetcher() -> HttpPageFetcher {
        HttpPageFetcher::new(&FetchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/laptops")
            .match_header("accept-language", mockito::Matcher::Regex("tr-TR".into()))
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><ul><li>product</li></ul></body></html>")
            .expect(1)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/laptops", server.url())).unwrap();
        let page = fetcher().fetch_page(&url).await.unwrap();

        assert_eq!(page.status, 200);
        assert!(page.body.contains("product"));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_page_rate_limited_with_retry_after() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/laptops")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/laptops", server.url())).unwrap();
        let err = fetcher().fetch_page(&url).await.unwrap_err();

        match err {
            PageError::Status {
                status,
                retry_after,
                ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_detects_challenge() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/laptops")
            .with_status(200)
            .with_body("<html><div id=\"px-captcha\"></div></html>")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/laptops", server.url())).unwrap();
        let err = fetcher().fetch_page(&url).await.unwrap_err();
        assert!(matches!(err, PageError::Challenge { .. }));
    }

    #[tokio::test]
    async fn test_fetch_page_empty_body_is_malformed() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/laptops")
            .with_status(200)
            .with_body("   ")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/laptops", server.url())).unwrap();
        let err = fetcher().fetch_page(&url).await.unwrap_err();
        assert!(matches!(err, PageError::Malformed { .. }));
    }

    #[test]
    fn test_detect_challenge_is_case_insensitive() {
        let markers = vec!["px-captcha".to_string(), "cf-chl".to_string()];
        assert_eq!(
            detect_challenge("<div id=\"PX-CAPTCHA\"></div>", &markers),
            Some("px-captcha")
        );
        assert_eq!(detect_challenge("<html>normal page</html>", &markers), None);
    }

    #[test]
    fn test_default_markers_ignore_embedded_captcha_widgets() {
        let markers = FetchConfig::default().challenge_markers;
        let product_page = r#"<html><head>
              <script src="https://www.google.com/recaptcha/api.js"></script>
            </head><body>
              <h1 data-test-id="title">Laptop X</h1>
              <form id="question"><div class="g-recaptcha" data-sitekey="k"></div></form>
              <p>Captcha doğrulaması sonrası sorunuz yayınlanır.</p>
            </body></html>"#;
        assert_eq!(detect_challenge(product_page, &markers), None);

        let interstitial = r#"<html><body>
              <form id="challenge-form" action="/?__cf_chl_f_tk=abc">
              <script src="/cdn-cgi/challenge-platform/h/b/orchestrate/jsch/v1"></script>
            </body></html>"#;
        assert!(detect_challenge(interstitial, &markers).is_some());
    }

    #[tokio::test]
    async fn test_fixture_serves_failures_then_page() {
        let fixtures = FixturePageFetcher::new()
            .with_page("https://shop.test/a", "<html>ok</html>")
            .with_failures("https://shop.test/a", &[503, 429]);
        let url = Url::parse("https://shop.test/a").unwrap();

        assert!(matches!(
            fixtures.fetch_page(&url).await,
            Err(PageError::Status { status: 503, .. })
        ));
        assert!(matches!(
            fixtures.fetch_page(&url).await,
            Err(PageError::Status { status: 429, .. })
        ));
        assert_eq!(fixtures.fetch_page(&url).await.unwrap().body, "<html>ok</html>");
        assert_eq!(fixtures.calls_for("https://shop.test/a"), 3);
    }

    #[tokio::test]
    async fn test_fixture_unknown_url() {
        let fixtures = FixturePageFetcher::new();
        let url = Url::parse("https://shop.test/missing").unwrap();
        assert!(matches!(
            fixtures.fetch_page(&url).await,
            Err(PageError::NotFound(_))
        ));
        assert_eq!(fixtures.calls(), 1);
    }
}
