//! # shopsense CLI
//!
//! Command-line interface for collecting high-volume products, harvesting
//! their reviews and turning them into buy / don't-buy verdicts.
//!
//! ## Subcommands
//!
//! - `collect`: list qualifying products from category pages
//! - `harvest`: harvest and store explicit product pages
//! - `summarize`: (re)generate verdicts for every stored product
//! - `run`: collect, harvest and summarize in one pass
//! - `list`: show stored products and verdicts
//!
//! The first Ctrl-C lets the product in flight finish and be stored, then
//! stops. A second Ctrl-C aborts that product at its next wait. Everything
//! stored before that is kept.

mod telemetry;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use shopsense::catalog::{CatalogConfig, DEFAULT_SUMMARY_MARKER, LinkCollector, ProductRef, category_label};
use shopsense::fetch::{FetchConfig, HttpPageFetcher, ResilientFetcher};
use shopsense::model::gemini_from_env;
use shopsense::pipeline::{Pipeline, PipelineConfig, PipelineEvent, RunControl, RunReport};
use shopsense::store::Database;
use shopsense::summarizer::{AspectBreakdown, SummarizerConfig};
use std::path::PathBuf;
use telemetry::TelemetryOptions;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{instrument, warn};
use url::Url;

#[derive(Parser)]
#[command(author, version, about = "Review harvesting and verdict generation for high-volume products", long_about = None)]
struct Cli {
    /// Export traces and metrics over OTLP
    #[arg(long, global = true)]
    otel: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List qualifying products from category pages
    Collect(CollectArgs),

    /// Harvest and store product pages with their reviews
    Harvest(HarvestArgs),

    /// Generate verdicts for all stored products
    Summarize(SummarizeArgs),

    /// Collect, harvest and summarize
    Run(RunArgs),

    /// List stored products and verdicts
    List(ListArgs),
}

#[derive(Args, Debug, Clone)]
struct FetchArgs {
    /// Maximum attempts per request
    #[arg(long, default_value = "5")]
    max_attempts: u32,

    /// First backoff delay in milliseconds
    #[arg(long, default_value = "1000")]
    base_delay_ms: u64,

    /// Backoff delay cap in milliseconds
    #[arg(long, default_value = "60000")]
    max_delay_ms: u64,

    /// Backoff jitter fraction (0.0 - 1.0)
    #[arg(long, default_value = "0.2")]
    jitter: f64,

    /// Minimum interval between site requests in milliseconds
    #[arg(long, default_value = "2000")]
    min_request_interval_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,
}

impl FetchArgs {
    fn config(&self) -> FetchConfig {
        FetchConfig::builder()
            .max_attempts(self.max_attempts)
            .base_delay_ms(self.base_delay_ms)
            .max_delay_ms(self.max_delay_ms)
            .jitter(self.jitter)
            .min_request_interval_ms(self.min_request_interval_ms)
            .request_timeout_secs(self.request_timeout_secs)
            .build()
    }
}

#[derive(Args, Debug, Clone)]
struct CatalogArgs {
    /// Minimum review count for a product to qualify
    #[arg(long, default_value = "1000")]
    min_reviews: u32,

    /// Listing pages per category
    #[arg(long, default_value = "50")]
    max_pages: u32,

    /// Products per run
    #[arg(long, default_value = "1000")]
    max_products: usize,

    /// Review pages per product
    #[arg(long, default_value = "100")]
    max_review_pages: u32,

    /// Reviews kept per product
    #[arg(long, default_value = "2000")]
    max_reviews: usize,

    /// Only keep products whose review page shows the site's review summary
    #[arg(long)]
    require_summary: bool,
}

impl CatalogArgs {
    fn config(&self) -> CatalogConfig {
        CatalogConfig::builder()
            .min_review_threshold(self.min_reviews)
            .max_pages(self.max_pages)
            .max_products(self.max_products)
            .max_review_pages(self.max_review_pages)
            .max_reviews_per_product(self.max_reviews)
            .summary_marker(
                self.require_summary
                    .then(|| DEFAULT_SUMMARY_MARKER.to_string()),
            )
            .build()
    }
}

#[derive(Args, Debug, Clone)]
struct SummarizerArgs {
    /// LLM model to use
    #[arg(short, long, default_value = "gemini-2.0-flash")]
    model: String,

    /// Characters of review text per chunk request
    #[arg(long, default_value = "8000")]
    max_chunk_chars: usize,

    /// Characters of partial summaries sent in the verdict request
    #[arg(long, default_value = "32000")]
    max_reduction_chars: usize,

    /// Minimum interval between generation requests in milliseconds
    #[arg(long, default_value = "1500")]
    llm_min_interval_ms: u64,

    /// Provider request quota per minute
    #[arg(long, default_value = "30")]
    llm_requests_per_minute: u32,
}

impl SummarizerArgs {
    fn config(&self) -> SummarizerConfig {
        SummarizerConfig::builder()
            .model(self.model.clone())
            .max_chunk_chars(self.max_chunk_chars)
            .max_reduction_chars(self.max_reduction_chars)
            .llm_min_interval_ms(self.llm_min_interval_ms)
            .llm_requests_per_minute(self.llm_requests_per_minute)
            .build()
    }
}

#[derive(Args, Debug)]
struct CollectArgs {
    /// Category listing URLs
    #[arg(required = true)]
    categories: Vec<Url>,

    #[command(flatten)]
    fetch: FetchArgs,

    #[command(flatten)]
    catalog: CatalogArgs,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args, Debug)]
struct HarvestArgs {
    /// Product page URLs
    #[arg(required = true)]
    products: Vec<Url>,

    #[command(flatten)]
    fetch: FetchArgs,

    #[command(flatten)]
    catalog: CatalogArgs,

    /// Database path
    #[arg(long, default_value = "shopsense.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    #[command(flatten)]
    summarizer: SummarizerArgs,

    /// Database path
    #[arg(long, default_value = "shopsense.db")]
    database: PathBuf,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Category listing URLs
    #[arg(required = true)]
    categories: Vec<Url>,

    #[command(flatten)]
    fetch: FetchArgs,

    #[command(flatten)]
    catalog: CatalogArgs,

    #[command(flatten)]
    summarizer: SummarizerArgs,

    /// Database path
    #[arg(long, default_value = "shopsense.db")]
    database: PathBuf,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Show verdict texts
    #[arg(short, long)]
    details: bool,

    /// Database path
    #[arg(long, default_value = "shopsense.db")]
    database: PathBuf,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber(&TelemetryOptions {
        otel: cli.otel,
        log_dir: cli.log_dir.clone(),
    })?;

    let control = RunControl::new();
    tokio::spawn({
        let control = control.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            eprintln!("Stopping after the current product (Ctrl-C again to abort it)...");
            control.stop();

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Aborting the current product...");
                control.abort();
            }
        }
    });

    match cli.command {
        Some(Commands::Collect(args)) => collect_command(args, control).await?,
        Some(Commands::Harvest(args)) => harvest_command(args, control).await?,
        Some(Commands::Summarize(args)) => summarize_command(args, control).await?,
        Some(Commands::Run(args)) => run_command(args, control).await?,
        Some(Commands::List(args)) => list_command(args).await?,
        None => {
            let _ = Cli::parse_from(["shopsense", "--help"]);
        }
    }

    Ok(())
}

#[instrument(skip(control))]
async fn collect_command(args: CollectArgs, control: RunControl) -> anyhow::Result<()> {
    let fetch = args.fetch.config();
    let catalog = args.catalog.config();
    let pages = HttpPageFetcher::new(&fetch)?;
    let fetcher = ResilientFetcher::from_config(&fetch, control.stop_token());

    let collector = LinkCollector::new(pages, fetcher, catalog.clone())?;
    let collection = collector
        .collect(&args.categories, catalog.min_review_threshold)
        .await?;

    match args.format.as_str() {
        "json" => {
            let json = serde_json::json!({
                "products": collection.products,
                "stats": collection.stats,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            for product in &collection.products {
                println!("{}\t{}", product.category, product.url);
            }
            println!(
                "\n{} qualifying products ({} candidates, {} below threshold, {} page errors)",
                collection.products.len(),
                collection.stats.candidates,
                collection.stats.below_threshold,
                collection.stats.page_errors
            );
        }
    }

    Ok(())
}

#[instrument(skip(control))]
async fn harvest_command(args: HarvestArgs, control: RunControl) -> anyhow::Result<()> {
    let config = PipelineConfig::builder()
        .fetch(args.fetch.config())
        .catalog(args.catalog.config())
        .summarize(false)
        .build();
    let pages = HttpPageFetcher::new(&config.fetch)?;
    let db = open_database(&args.database).await?;
    let pipeline = Pipeline::harvest_only(pages, db, config.clone(), control)?;

    let products: Vec<ProductRef> = args
        .products
        .into_iter()
        .map(|url| {
            let category = category_label(&url);
            ProductRef::new(url, category)
        })
        .collect();

    let (sender, progress) = progress_channel(&config, "Harvesting");
    let report = pipeline.with_events(sender).harvest(&products).await?;
    let _ = progress.await;

    println!(
        "Harvested {} of {} products into {}",
        report.harvested,
        products.len(),
        args.database.display()
    );
    print_failures(&report);
    Ok(())
}

#[instrument(skip(control))]
async fn summarize_command(args: SummarizeArgs, control: RunControl) -> anyhow::Result<()> {
    let config = PipelineConfig::builder()
        .summarizer(args.summarizer.config())
        .build();
    let db = open_database(&args.database).await?;
    let model = gemini_from_env(
        &config.summarizer.model,
        config.summarizer.llm_requests_per_minute,
    )?;
    let pages = HttpPageFetcher::new(&config.fetch)?;

    let pipeline = Pipeline::new(pages, model, db, config.clone(), control)?;
    let (sender, progress) = progress_channel(&config, "Summarizing");
    let report = pipeline.with_events(sender).summarize_stored().await?;
    let _ = progress.await;

    print_report(&report, &args.format)
}

#[instrument(skip(control))]
async fn run_command(args: RunArgs, control: RunControl) -> anyhow::Result<()> {
    let config = PipelineConfig::builder()
        .fetch(args.fetch.config())
        .catalog(args.catalog.config())
        .summarizer(args.summarizer.config())
        .build();
    let db = open_database(&args.database).await?;
    let model = gemini_from_env(
        &config.summarizer.model,
        config.summarizer.llm_requests_per_minute,
    )?;
    let pages = HttpPageFetcher::new(&config.fetch)?;

    let pipeline = Pipeline::new(pages, model, db, config.clone(), control)?;
    let (sender, progress) = progress_channel(&config, "Processing");
    let report = pipeline.with_events(sender).run(&args.categories).await?;
    let _ = progress.await;

    print_report(&report, &args.format)
}

#[instrument]
async fn list_command(args: ListArgs) -> anyhow::Result<()> {
    let db = open_database(&args.database).await?;
    let products = db.list_products().await?;
    let summaries = db.list_summaries().await?;

    if args.format == "json" {
        let json = serde_json::json!({
            "products": products,
            "summaries": summaries,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("No products stored in {}", args.database.display());
        return Ok(());
    }

    for product in &products {
        println!(
            "{}  {}  {}  {:.1}★  {} reviews ({} stored){}",
            product.product_ref.category,
            product.name.as_deref().unwrap_or("-"),
            product.price,
            product.rating,
            product.review_count,
            product.stored_reviews,
            if product.has_summary { "  [summarized]" } else { "" }
        );
        println!("  {}", product.product_ref.url);

        if args.details {
            if let Some(summary) = summaries
                .iter()
                .find(|s| s.product_ref == product.product_ref)
            {
                println!("  {}: {}", summary.sentiment, summary.verdict_text);
                print_aspects(summary.aspects.as_ref());
            }
        }
    }

    println!("\n{} products, {} verdicts", products.len(), summaries.len());
    Ok(())
}

async fn open_database(path: &std::path::Path) -> anyhow::Result<Database> {
    let path = path.to_string_lossy();
    Database::new_from_path(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path))
}

/// Spawn a progress bar fed by pipeline events
fn progress_channel(
    config: &PipelineConfig,
    label: &'static str,
) -> (mpsc::Sender<PipelineEvent>, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel(config.event_buffer);

    let progress_bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}");
    match style {
        Ok(style) => progress_bar.set_style(style.progress_chars("##-")),
        Err(e) => warn!(error = %e, "Invalid progress template"),
    }
    progress_bar.set_message(label);

    let handle = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                PipelineEvent::Collected { products } => {
                    progress_bar.set_length(products as u64);
                }
                PipelineEvent::ProductStarted {
                    index,
                    total,
                    product_ref,
                } => {
                    progress_bar.set_length(total as u64);
                    progress_bar.set_position(index as u64);
                    progress_bar.set_message(format!("{} {}", label, product_ref.url.path()));
                }
                PipelineEvent::Harvested { reviews, .. } => {
                    progress_bar.set_message(format!("{} reviews harvested", reviews));
                }
                PipelineEvent::Summarized { sentiment, .. } => {
                    progress_bar.inc(1);
                    progress_bar.set_message(format!("verdict: {}", sentiment));
                }
                PipelineEvent::Failed(failure) => {
                    progress_bar.println(format!(
                        "failed at {}: {} ({})",
                        failure.stage, failure.product_ref, failure.reason
                    ));
                }
                PipelineEvent::Cancelled => {
                    progress_bar.abandon_with_message("Cancelled");
                    return;
                }
                PipelineEvent::Finished { summaries, failures } => {
                    progress_bar.finish_with_message(format!(
                        "{} verdicts, {} failures",
                        summaries, failures
                    ));
                }
            }
        }
    });

    (sender, handle)
}

fn print_aspects(aspects: Option<&AspectBreakdown>) {
    let Some(aspects) = aspects else {
        return;
    };
    if !aspects.positive_aspects.is_empty() {
        println!("  + {}", aspects.positive_aspects.join(" | "));
    }
    if !aspects.negative_aspects.is_empty() {
        println!("  - {}", aspects.negative_aspects.join(" | "));
    }
    let topics = [
        ("price/performance", &aspects.price_performance),
        ("packaging", &aspects.packaging_quality),
        ("shipping", &aspects.shipping_speed),
    ];
    for (label, value) in topics {
        if let Some(value) = value {
            println!("  {}: {}", label, value);
        }
    }
}

fn print_failures(report: &RunReport) {
    if report.failures.is_empty() {
        return;
    }
    println!("\nFailures:");
    for failure in &report.failures {
        println!("  [{}] {}: {}", failure.stage, failure.product_ref, failure.reason);
    }
}

fn print_report(report: &RunReport, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for summary in &report.summaries {
        println!("\n{} [{}]", summary.product_ref, summary.sentiment);
        println!(
            "  {} reviews, {} chunks ({} degraded)",
            summary.reviews_analyzed, summary.chunks_used, summary.chunks_degraded
        );
        println!("  {}", summary.verdict_text);
        print_aspects(summary.aspects.as_ref());
    }

    print_failures(report);

    println!(
        "\n{} verdicts, {} failures, {} generation requests",
        report.summaries.len(),
        report.failures.len(),
        report.usage.requests
    );
    if report.cancelled {
        println!("Run cancelled; completed products were saved");
    }
    Ok(())
}
