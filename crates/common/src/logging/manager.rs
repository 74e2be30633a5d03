//! Logging initialization and shutdown.

use std::sync::OnceLock;

use opentelemetry::{
    global::{self, set_text_map_propagator},
    trace::{TraceError, TracerProvider},
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    runtime::Tokio,
    trace::{Config, TracerProvider as SdkTracerProvider},
};
use thiserror::Error;
use tracing::*;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{
    filter::{EnvFilter, ParseError},
    fmt::layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    Layer,
};

use super::types::LoggerConfig;

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Dependencies that are too chatty at INFO.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "h2=warn", "reqwest=warn", "tonic=warn"];

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log directive: {0}")]
    Directive(#[from] ParseError),

    #[error("otlp pipeline: {0}")]
    Otlp(#[from] TraceError),

    #[error("subscriber already set: {0}")]
    Init(#[from] TryInitError),
}

/// Installs the global subscriber. `RUST_LOG` overrides the INFO default.
pub fn init(config: LoggerConfig) -> Result<(), LoggingError> {
    set_text_map_propagator(TraceContextPropagator::new());

    let mut filt = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    for directive in QUIET_TARGETS {
        filt = filt.add_directive(directive.parse()?);
    }

    let stdout_sub = if config.stdout.json_format {
        layer()
            .json()
            .with_span_events(config.stdout.fmt_span.clone())
            .with_filter(filt.clone())
            .boxed()
    } else {
        layer()
            .compact()
            .with_span_events(config.stdout.fmt_span.clone())
            .with_filter(filt.clone())
            .boxed()
    };

    let file_layer = config.file.as_ref().map(|file_config| {
        let appender = RollingFileAppender::new(
            file_config.rotation.clone(),
            &file_config.directory,
            &file_config.file_name_prefix,
        );

        if file_config.json_format {
            layer()
                .json()
                .with_writer(appender)
                .with_ansi(false)
                .with_filter(filt.clone())
                .boxed()
        } else {
            layer()
                .compact()
                .with_writer(appender)
                .with_ansi(false)
                .with_filter(filt.clone())
                .boxed()
        }
    });

    let otel_layer = match &config.otlp {
        Some(otlp) => {
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(otlp.endpoint.clone())
                .with_timeout(otlp.timeout);

            let tp = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(Config::default().with_resource(config.build_resource()))
                .install_batch(Tokio)?;

            if TRACER_PROVIDER.set(tp.clone()).is_err() {
                error!("tracer provider already set");
            }

            let tt = tp.tracer("slp-indexer");
            Some(tracing_opentelemetry::layer().with_tracer(tt))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_sub)
        .with(file_layer)
        .with(otel_layer)
        .try_init()?;

    info!(
        service_name = %config.service_name,
        service_version = ?config.service_version,
        "logging initialized"
    );

    Ok(())
}

/// Flushes pending spans. Call before exit.
pub fn finalize() {
    info!("shutting down logging");

    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            error!(?e, "failed to shut down tracer provider");
        }
    }

    global::shutdown_tracer_provider();
}
