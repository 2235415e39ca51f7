//! Sequential collect, harvest, store and summarize

use super::config::PipelineConfig;
use super::control::RunControl;
use super::report::{PipelineEvent, ProductFailure, RunReport, Stage};
use crate::catalog::{LinkCollector, ProductRecord, ProductRef, ReviewHarvester};
use crate::error::Result;
use crate::fetch::{PageFetcher, RequestThrottle, ResilientFetcher};
use crate::store::Database;
use crate::summarizer::ChunkedSummarizer;
use rig::completion::CompletionModel;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Drives a run one product at a time
///
/// The product record is stored as soon as it is harvested and the verdict as
/// soon as it is generated, so an interrupted run loses at most the product in
/// flight. Failures are recorded per product and never stop the run. A stop
/// request is honored at product boundaries only; an abort also interrupts the
/// product in flight.
pub struct Pipeline<P, M> {
    collector: LinkCollector<P>,
    harvester: ReviewHarvester<P>,
    summarizer: Option<ChunkedSummarizer<M>>,
    db: Database,
    config: PipelineConfig,
    control: RunControl,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

/// Site fetchers: the collector stops on `stop`, product work only on `abort`
///
/// Both share one site throttle.
fn site_fetchers(config: &PipelineConfig, control: &RunControl) -> (ResilientFetcher, ResilientFetcher) {
    let collecting = ResilientFetcher::from_config(&config.fetch, control.stop_token());
    let product = collecting.with_cancellation(control.abort_token());
    (collecting, product)
}

impl<P: PageFetcher + Clone> Pipeline<P, ()> {
    /// Wire a pipeline that harvests and stores but never summarizes
    pub fn harvest_only(
        pages: P,
        db: Database,
        config: PipelineConfig,
        control: RunControl,
    ) -> Result<Self> {
        let (collecting, product) = site_fetchers(&config, &control);
        let collector = LinkCollector::new(pages.clone(), collecting, config.catalog.clone())?;
        let harvester = ReviewHarvester::new(pages, product, config.catalog.clone())?;

        Ok(Self {
            collector,
            harvester,
            summarizer: None,
            db,
            config,
            control,
            events: None,
        })
    }

    /// Harvest and store an explicit product list
    #[instrument(skip(self, products), fields(products = products.len()))]
    pub async fn harvest(&self, products: &[ProductRef]) -> Result<RunReport> {
        let mut report = RunReport::default();
        let total = products.len();

        for (index, product_ref) in products.iter().enumerate() {
            if self.at_boundary(&mut report) {
                break;
            }
            if self
                .harvest_and_store(index, total, product_ref, &mut report)
                .await
                .is_break()
            {
                report.cancelled = true;
                break;
            }
        }

        self.finish(&mut report).await;
        Ok(report)
    }
}

impl<P, M> Pipeline<P, M>
where
    P: PageFetcher + Clone,
    M: CompletionModel,
{
    /// Wire the stages together
    ///
    /// Site requests share one throttle; generation requests get their own,
    /// paced by `llm_min_interval_ms`.
    pub fn new(
        pages: P,
        model: M,
        db: Database,
        config: PipelineConfig,
        control: RunControl,
    ) -> Result<Self> {
        let (collecting, product) = site_fetchers(&config, &control);
        let generation = product.with_throttle(Arc::new(RequestThrottle::new(
            config.summarizer.llm_min_interval(),
        )));

        let collector = LinkCollector::new(pages.clone(), collecting, config.catalog.clone())?;
        let harvester = ReviewHarvester::new(pages, product, config.catalog.clone())?;
        let summarizer = ChunkedSummarizer::new(model, generation, config.summarizer.clone());

        Ok(Self {
            collector,
            harvester,
            summarizer: Some(summarizer),
            db,
            config,
            control,
            events: None,
        })
    }

    /// Collect qualifying products from categories, then process them
    #[instrument(skip(self, category_urls), fields(categories = category_urls.len()))]
    pub async fn run(&self, category_urls: &[Url]) -> Result<RunReport> {
        let collection = match self
            .collector
            .collect(category_urls, self.config.catalog.min_review_threshold)
            .await
        {
            Ok(collection) => collection,
            Err(e) if e.is_cancelled() => {
                warn!("Run cancelled during link collection");
                self.emit(PipelineEvent::Cancelled).await;
                return Ok(RunReport {
                    cancelled: true,
                    ..RunReport::default()
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.emit(PipelineEvent::Collected {
            products: collection.products.len(),
        })
        .await;

        let products: Vec<ProductRef> = collection.products.into_iter().collect();
        let mut report = self.process(&products).await?;
        report.collection = Some(collection.stats);
        Ok(report)
    }

    /// Harvest, store and optionally summarize an explicit product list
    #[instrument(skip(self, products), fields(products = products.len()))]
    pub async fn process(&self, products: &[ProductRef]) -> Result<RunReport> {
        let mut report = RunReport::default();
        let total = products.len();

        for (index, product_ref) in products.iter().enumerate() {
            if self.at_boundary(&mut report) {
                break;
            }

            let record = match self
                .harvest_and_store(index, total, product_ref, &mut report)
                .await
            {
                ControlFlow::Continue(Some(record)) => record,
                ControlFlow::Continue(None) => continue,
                ControlFlow::Break(()) => {
                    report.cancelled = true;
                    break;
                }
            };

            if self.config.summarize
                && self.summarize_record(&record, &mut report).await.is_break()
            {
                report.cancelled = true;
                break;
            }
        }

        self.finish(&mut report).await;
        Ok(report)
    }

    /// Re-summarize every stored product, overwriting earlier verdicts
    #[instrument(skip(self))]
    pub async fn summarize_stored(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        let stored = self.db.list_products().await?;
        let total = stored.len();
        info!(products = total, "Summarizing stored products");

        for (index, entry) in stored.iter().enumerate() {
            if self.at_boundary(&mut report) {
                break;
            }
            self.emit(PipelineEvent::ProductStarted {
                index,
                total,
                product_ref: entry.product_ref.clone(),
            })
            .await;

            let record = match self.db.load_product(&entry.product_ref.url).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    let failure = ProductFailure::new(&entry.product_ref, Stage::Store, e);
                    self.fail(&mut report, failure).await;
                    continue;
                }
            };

            if self.summarize_record(&record, &mut report).await.is_break() {
                report.cancelled = true;
                break;
            }
        }

        self.finish(&mut report).await;
        Ok(report)
    }

    /// Summarize one record and store the verdict; breaks on abort
    async fn summarize_record(
        &self,
        record: &ProductRecord,
        report: &mut RunReport,
    ) -> ControlFlow<()> {
        let Some(summarizer) = &self.summarizer else {
            return ControlFlow::Continue(());
        };
        let product_ref = &record.product_ref;
        let summary = match summarizer.summarize(product_ref, &record.reviews).await {
            Ok(summary) => summary,
            Err(e) if e.is_cancelled() => return ControlFlow::Break(()),
            Err(e) => {
                self.fail(report, ProductFailure::new(product_ref, Stage::Summarize, e))
                    .await;
                return ControlFlow::Continue(());
            }
        };

        if let Err(e) = self.db.save_summary(&summary).await {
            self.fail(report, ProductFailure::new(product_ref, Stage::Store, e))
                .await;
            return ControlFlow::Continue(());
        }

        self.emit(PipelineEvent::Summarized {
            product_ref: product_ref.clone(),
            sentiment: summary.sentiment,
        })
        .await;
        report.summaries.push(summary);
        ControlFlow::Continue(())
    }
}

impl<P: PageFetcher, M> Pipeline<P, M> {
    /// Send progress events to `sender`
    pub fn with_events(mut self, sender: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    /// True when the run should end before the next product
    fn at_boundary(&self, report: &mut RunReport) -> bool {
        if self.control.is_stopped() {
            report.cancelled = true;
        }
        report.cancelled
    }

    /// Harvest one product and checkpoint it
    ///
    /// Yields the stored record, `None` when the product failed, or breaks
    /// when the run was aborted mid-product.
    async fn harvest_and_store(
        &self,
        index: usize,
        total: usize,
        product_ref: &ProductRef,
        report: &mut RunReport,
    ) -> ControlFlow<(), Option<ProductRecord>> {
        self.emit(PipelineEvent::ProductStarted {
            index,
            total,
            product_ref: product_ref.clone(),
        })
        .await;

        let record = match self.harvester.harvest(product_ref).await {
            Ok(record) => record,
            Err(e) if e.is_cancelled() => return ControlFlow::Break(()),
            Err(e) => {
                self.fail(report, ProductFailure::new(product_ref, Stage::Harvest, e))
                    .await;
                return ControlFlow::Continue(None);
            }
        };

        if let Err(e) = self.db.save_product(&record).await {
            self.fail(report, ProductFailure::new(product_ref, Stage::Store, e))
                .await;
            return ControlFlow::Continue(None);
        }
        report.harvested += 1;
        self.emit(PipelineEvent::Harvested {
            product_ref: product_ref.clone(),
            reviews: record.reviews.len(),
        })
        .await;

        ControlFlow::Continue(Some(record))
    }

    async fn fail(&self, report: &mut RunReport, failure: ProductFailure) {
        error!(
            product = %failure.product_ref,
            stage = %failure.stage,
            reason = %failure.reason,
            "Product failed"
        );
        self.emit(PipelineEvent::Failed(failure.clone())).await;
        report.failures.push(failure);
    }

    async fn finish(&self, report: &mut RunReport) {
        report.usage = self
            .summarizer
            .as_ref()
            .map(ChunkedSummarizer::usage)
            .unwrap_or_default();
        if report.cancelled {
            warn!("Run cancelled at product boundary");
            self.emit(PipelineEvent::Cancelled).await;
        }
        info!(
            harvested = report.harvested,
            summaries = report.summaries.len(),
            failures = report.failures.len(),
            requests = report.usage.requests,
            "Run finished"
        );
        self.emit(PipelineEvent::Finished {
            summaries: report.summaries.len(),
            failures: report.failures.len(),
        })
        .await;
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.events {
            if sender.send(event).await.is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogConfig;
    use crate::fetch::{FetchConfig, FixturePageFetcher, Page, PageError};
    use crate::model::MockCompletionModel;
    use crate::summarizer::Sentiment;
    use rig::completion::{CompletionError, CompletionRequest, CompletionResponse};
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::Instant;

    const LISTING_URL: &str = "https://shop.test/laptops?sayfa=1";

    fn tile(href: &str, count: &str) -> String {
        format!(
            r#"<li class="productListContent-zAP0Y5msy8OHn5z7T_K_">
                 <a href="{href}">product</a>
                 <span class="rate-module_count__fjUng">({count})</span>
               </li>"#
        )
    }

    fn listing(tiles: &[String]) -> String {
        format!("<html><body><ul>{}</ul></body></html>", tiles.join("\n"))
    }

    fn product_page(name: &str) -> String {
        format!(
            r#"<html><body>
                 <h1 data-test-id="title">{name}</h1>
                 <div data-test-id="price-current-price">18.499,90 TL</div>
                 <span data-test-id="rating-average">4,5</span>
                 <span data-test-id="review-count">(1.250)</span>
               </body></html>"#
        )
    }

    fn review_page(texts: &[&str]) -> String {
        let items: Vec<String> = texts
            .iter()
            .map(|text| format!(r#"<div itemprop="review"><p itemprop="description">{text}</p></div>"#))
            .collect();
        format!("<html><body>{}</body></html>", items.join("\n"))
    }

    /// Two qualifying products, one below threshold
    fn site() -> FixturePageFetcher {
        FixturePageFetcher::new()
            .with_page(
                LISTING_URL,
                listing(&[
                    tile("/a-p-1", "1.500"),
                    tile("/b-p-2", "300"),
                    tile("/c-p-3", "2.000"),
                ]),
            )
            .with_page("https://shop.test/laptops?sayfa=2", listing(&[]))
            .with_page("https://shop.test/a-p-1", product_page("A"))
            .with_page("https://shop.test/a-p-1-yorumlari?sayfa=1", review_page(&["iyi", "güzel"]))
            .with_page("https://shop.test/a-p-1-yorumlari?sayfa=2", review_page(&[]))
            .with_page("https://shop.test/c-p-3", product_page("C"))
            .with_page("https://shop.test/c-p-3-yorumlari?sayfa=1", review_page(&["fena değil"]))
            .with_page("https://shop.test/c-p-3-yorumlari?sayfa=2", review_page(&[]))
    }

    fn config() -> PipelineConfig {
        PipelineConfig::builder()
            .fetch(
                FetchConfig::builder()
                    .max_attempts(2)
                    .base_delay_ms(10)
                    .max_delay_ms(100)
                    .min_request_interval_ms(0)
                    .build(),
            )
            .catalog(CatalogConfig::default())
            .summarizer(
                crate::summarizer::SummarizerConfig::builder()
                    .llm_min_interval_ms(0)
                    .build(),
            )
            .build()
    }

    async fn database() -> (Database, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("run.db").to_string_lossy().to_string();
        (Database::new_from_path(&path).await.unwrap(), temp_dir)
    }

    async fn setup(
        pages: FixturePageFetcher,
        control: RunControl,
    ) -> (Pipeline<FixturePageFetcher, MockCompletionModel>, MockCompletionModel, tempfile::TempDir) {
        let (db, temp_dir) = database().await;

        let model = MockCompletionModel::new();
        model.set_text_response("Alınabilir.\nSENTIMENT: positive").await;

        let pipeline = Pipeline::new(pages, model.clone(), db, config(), control).unwrap();
        (pipeline, model, temp_dir)
    }

    fn product(path: &str) -> ProductRef {
        ProductRef::new(Url::parse(&format!("https://shop.test{path}")).unwrap(), "laptops")
    }

    /// Site fixture that records when each request was made
    #[derive(Clone)]
    struct TimedPages {
        inner: FixturePageFetcher,
        times: Arc<std::sync::Mutex<Vec<Instant>>>,
    }

    impl PageFetcher for TimedPages {
        async fn fetch_page(&self, url: &Url) -> std::result::Result<Page, PageError> {
            self.times.lock().unwrap().push(Instant::now());
            self.inner.fetch_page(url).await
        }
    }

    /// Completion model that records when each request was made
    #[derive(Clone)]
    struct TimedModel {
        inner: MockCompletionModel,
        times: Arc<std::sync::Mutex<Vec<Instant>>>,
    }

    impl CompletionModel for TimedModel {
        type Response = String;

        async fn completion(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse<String>, CompletionError> {
            self.times.lock().unwrap().push(Instant::now());
            self.inner.completion(request).await
        }
    }

    fn gaps(times: &[Instant]) -> Vec<Duration> {
        times.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }

    fn category() -> Url {
        Url::parse("https://shop.test/laptops").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_end_to_end() {
        let (pipeline, model, _temp_dir) = setup(site(), RunControl::new()).await;
        let (tx, mut rx) = mpsc::channel(64);
        let pipeline = pipeline.with_events(tx);

        let report = pipeline.run(&[category()]).await.unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.harvested, 2);
        assert!(report.failures.is_empty());
        let urls: Vec<&str> = report.summaries.iter().map(|s| s.product_ref.url.as_str()).collect();
        assert_eq!(urls, vec!["https://shop.test/a-p-1", "https://shop.test/c-p-3"]);
        assert!(report.summaries.iter().all(|s| s.sentiment == Sentiment::Positive));
        assert_eq!(report.collection.as_ref().unwrap().below_threshold, 1);
        // One chunk and one reduction per product
        assert_eq!(model.calls(), 4);

        let db = pipeline.database();
        assert_eq!(db.list_products().await.unwrap().len(), 2);
        assert_eq!(db.list_summaries().await.unwrap().len(), 2);

        drop(pipeline);
        let mut finished = false;
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::Finished { summaries, failures } = event {
                assert_eq!((summaries, failures), (2, 0));
                finished = true;
            }
        }
        assert!(finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_contained_to_product() {
        let pages = FixturePageFetcher::new()
            .with_failures("https://shop.test/a-p-1", &[404])
            .with_page("https://shop.test/c-p-3", product_page("C"))
            .with_page("https://shop.test/c-p-3-yorumlari?sayfa=1", review_page(&["iyi"]))
            .with_page("https://shop.test/c-p-3-yorumlari?sayfa=2", review_page(&[]));
        let (pipeline, _model, _temp_dir) = setup(pages, RunControl::new()).await;

        let products = vec![
            ProductRef::new(Url::parse("https://shop.test/a-p-1").unwrap(), "laptops"),
            ProductRef::new(Url::parse("https://shop.test/c-p-3").unwrap(), "laptops"),
        ];
        let report = pipeline.process(&products).await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, Stage::Harvest);
        assert_eq!(report.failures[0].product_ref, products[0]);
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].product_ref, products[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_product_without_reviews_fails_summarization_but_is_stored() {
        let pages = FixturePageFetcher::new()
            .with_page("https://shop.test/a-p-1", product_page("A"))
            .with_page("https://shop.test/a-p-1-yorumlari?sayfa=1", review_page(&[]));
        let (pipeline, model, _temp_dir) = setup(pages, RunControl::new()).await;

        let product = ProductRef::new(Url::parse("https://shop.test/a-p-1").unwrap(), "laptops");
        let report = pipeline.process(&[product]).await.unwrap();

        assert_eq!(report.harvested, 1);
        assert_eq!(report.failures[0].stage, Stage::Summarize);
        assert_eq!(model.calls(), 0);
        assert_eq!(pipeline.database().list_products().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_overwrites_summaries() {
        let (pipeline, _model, _temp_dir) = setup(site(), RunControl::new()).await;

        pipeline.run(&[category()]).await.unwrap();
        let report = pipeline.summarize_stored().await.unwrap();

        assert_eq!(report.summaries.len(), 2);
        assert_eq!(pipeline.database().list_summaries().await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_writes_nothing() {
        let control = RunControl::new();
        let pages = site();
        let (pipeline, model, _temp_dir) = setup(pages.clone(), control.clone()).await;
        control.stop();

        let report = pipeline.run(&[category()]).await.unwrap();

        assert!(report.cancelled);
        assert!(report.summaries.is_empty());
        assert_eq!(pages.calls(), 0);
        assert_eq!(model.calls(), 0);
        assert!(pipeline.database().list_products().await.unwrap().is_empty());
    }

    /// Stops (or aborts) the run as soon as the first product starts
    async fn interrupt_first_product(
        mut rx: mpsc::Receiver<PipelineEvent>,
        control: RunControl,
        abort: bool,
    ) {
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::ProductStarted { index: 0, .. } = event {
                if abort {
                    control.abort();
                } else {
                    control.stop();
                }
                return;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_finishes_product_in_flight() {
        let control = RunControl::new();
        // A retried review page keeps the first product busy after the stop
        let pages = site().with_failures("https://shop.test/a-p-1-yorumlari?sayfa=1", &[503]);
        let (pipeline, model, _temp_dir) = setup(pages.clone(), control.clone()).await;
        let (tx, rx) = mpsc::channel(64);
        let pipeline = pipeline.with_events(tx);
        let products = vec![product("/a-p-1"), product("/c-p-3")];

        let (report, ()) = tokio::join!(
            pipeline.process(&products),
            interrupt_first_product(rx, control.clone(), false)
        );
        let report = report.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.harvested, 1);
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].product_ref, products[0]);
        assert!(report.failures.is_empty());
        assert_eq!(model.calls(), 2);
        assert_eq!(pages.calls_for("https://shop.test/c-p-3"), 0);

        let db = pipeline.database();
        let stored = db.load_product(&products[0].url).await.unwrap().unwrap();
        assert_eq!(stored.reviews.len(), 2);
        assert!(db.load_summary(&products[0].url).await.unwrap().is_some());
        assert!(db.load_product(&products[1].url).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_drops_product_in_flight() {
        let control = RunControl::new();
        // The abort lands while the product page is backing off
        let pages = site().with_failures("https://shop.test/a-p-1", &[503]);
        let (pipeline, model, _temp_dir) = setup(pages.clone(), control.clone()).await;
        let (tx, rx) = mpsc::channel(64);
        let pipeline = pipeline.with_events(tx);
        let products = vec![product("/a-p-1"), product("/c-p-3")];

        let (report, ()) = tokio::join!(
            pipeline.process(&products),
            interrupt_first_product(rx, control.clone(), true)
        );
        let report = report.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.harvested, 0);
        assert!(report.failures.is_empty());
        assert_eq!(pages.calls(), 1);
        assert_eq!(model.calls(), 0);
        assert!(pipeline.database().list_products().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_harvest_only_stores_products_without_verdicts() {
        let (db, _temp_dir) = database().await;
        let pipeline = Pipeline::harvest_only(site(), db, config(), RunControl::new()).unwrap();
        let products = vec![product("/a-p-1"), product("/c-p-3")];

        let report = pipeline.harvest(&products).await.unwrap();

        assert_eq!(report.harvested, 2);
        assert!(report.summaries.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(report.usage.requests, 0);
        let db = pipeline.database();
        assert_eq!(db.list_products().await.unwrap().len(), 2);
        assert!(db.list_summaries().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_site_and_generation_requests_are_paced_separately() {
        let site_times = Arc::new(std::sync::Mutex::new(Vec::new()));
        let model_times = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pages = TimedPages {
            inner: site(),
            times: site_times.clone(),
        };
        let mock = MockCompletionModel::new();
        mock.set_text_response("Alınabilir.\nSENTIMENT: positive").await;
        let model = TimedModel {
            inner: mock,
            times: model_times.clone(),
        };

        let config = PipelineConfig::builder()
            .fetch(
                FetchConfig::builder()
                    .max_attempts(2)
                    .min_request_interval_ms(1000)
                    .build(),
            )
            .summarizer(
                crate::summarizer::SummarizerConfig::builder()
                    .llm_min_interval_ms(300)
                    .build(),
            )
            .build();
        let (db, _temp_dir) = database().await;
        let pipeline = Pipeline::new(pages, model, db, config, RunControl::new()).unwrap();

        let report = pipeline.run(&[category()]).await.unwrap();
        assert_eq!(report.summaries.len(), 2);

        // Listing and product requests share one site throttle
        let site_times = site_times.lock().unwrap().clone();
        assert_eq!(site_times.len(), 8);
        assert!(gaps(&site_times).iter().all(|gap| *gap >= Duration::from_millis(1000)));

        // Generation requests follow their own, shorter interval
        let model_times = model_times.lock().unwrap().clone();
        assert_eq!(model_times.len(), 4);
        let model_gaps = gaps(&model_times);
        assert!(model_gaps.iter().all(|gap| *gap >= Duration::from_millis(300)));
        assert!(model_gaps.iter().any(|gap| *gap < Duration::from_millis(1000)));
    }
}
