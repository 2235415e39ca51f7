use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{MetricExporter, SpanExporter};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::SdkTracerProvider, Resource};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_opentelemetry::MetricsLayer;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

const SERVICE_NAME: &str = "shopsense";

/// Which sinks to enable besides the console
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions {
    /// Export traces and metrics over OTLP/HTTP
    pub otel: bool,

    /// Write a daily rolling log file into this directory
    pub log_dir: Option<PathBuf>,
}

fn get_resource() -> Resource {
    static RESOURCE: OnceLock<Resource> = OnceLock::new();
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

fn init_traces() -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .build()
        .context("Failed to create trace exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_metrics() -> anyhow::Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder()
        .with_http()
        .build()
        .context("Failed to create metric exporter")?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

// Initialize tracing-subscriber and return a guard that flushes exporters on drop
pub fn init_tracing_subscriber(options: &TelemetryOptions) -> anyhow::Result<OtelGuard> {
    let providers = if options.otel {
        Some((init_traces()?, init_metrics()?))
    } else {
        None
    };

    let tracer_layer = providers
        .as_ref()
        .map(|(tracer_provider, _)| OpenTelemetryLayer::new(tracer_provider.tracer(SERVICE_NAME)));
    let metrics_layer = providers
        .as_ref()
        .map(|(_, meter_provider)| MetricsLayer::new(meter_provider.clone()));

    let file_layer = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "shopsense.log");
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(env_filter()),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(metrics_layer)
        .with(tracer_layer)
        .init();

    Ok(OtelGuard { providers })
}

pub struct OtelGuard {
    providers: Option<(SdkTracerProvider, SdkMeterProvider)>,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Some((tracer_provider, meter_provider)) = self.providers.take() {
            if let Err(err) = tracer_provider.shutdown() {
                eprintln!("{err:?}");
            }
            if let Err(err) = meter_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
