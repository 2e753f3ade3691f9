//! Prop Metrics binary entry point.
//!
//! Reads metrics payloads as JSON lines from the files named on the command
//! line (or stdin when none are given), feeds them through the store, and
//! prints the resulting summary as pretty JSON. `--schema` prints the JSON
//! Schema of that summary instead.
//! All logs go to stderr; stdout carries only the summary.

// Enable the coverage attribute when running with nightly for llvm-cov exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::ffi::OsString;
use std::path::PathBuf;

use prop_metrics::config::{Config, LogFormat, DEFAULT_LOG_LEVEL};
use prop_metrics::error::AppError;
use prop_metrics::ingest::{ingest_file, ingest_stdin};
use prop_metrics::store::{MetricsStore, MetricsSummary};
use tracing_subscriber::filter::EnvFilter;

fn init_tracing(level: &str, format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn wants_schema(mut args: impl Iterator<Item = OsString>) -> bool {
    args.nth(1).is_some_and(|arg| arg == "--schema")
}

fn load_config() -> Result<Config, AppError> {
    Ok(Config::from_env()?)
}

async fn run(store: &MetricsStore, paths: &[PathBuf]) -> Result<(), AppError> {
    if paths.is_empty() {
        ingest_stdin(store).await?;
    }
    for path in paths {
        let report = ingest_file(store, path).await?;
        tracing::info!(
            file = %path.display(),
            applied = report.applied,
            envelopes = report.envelopes,
            "Input file processed"
        );
    }
    Ok(())
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    if wants_schema(std::env::args_os()) {
        match serde_json::to_string_pretty(&MetricsSummary::json_schema()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to render schema: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    // Load configuration from environment
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(DEFAULT_LOG_LEVEL, LogFormat::Text);
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level, config.log_format);
    tracing::info!(
        "Configuration loaded: unit={:?}, stale_after={}s",
        config.selectors.cache_rate_unit,
        config.stale_after_secs
    );

    let store = config.build_store();
    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    if let Err(e) = run(&store, &paths).await {
        tracing::error!("Input error: {e}");
        std::process::exit(1);
    }

    match serde_json::to_string_pretty(&store.summary()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("Failed to render summary: {e}");
            std::process::exit(1);
        }
    }
}
