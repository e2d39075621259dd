//! # Dealflow Scraper
//!
//! Collects startup dealflow records from a handful of configured sources,
//! normalises them into one flat schema and stores the result as a JSON file
//! and/or in a Google Sheets worksheet.
//!
//! ## Usage
//!
//! ```sh
//! dealflow_scraper --sources sample_api --output dealflow.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Registry**: built-in sources plus any declared in the YAML config
//! 2. **Fetching**: one HTTP GET per selected source, failures skipped
//! 3. **Parsing**: per-source parser (JSON, HTML listing, RSS/Atom)
//! 4. **Normalising**: fixed field list with empty defaults
//! 5. **Output**: JSON file, Google Sheets worksheet

use clap::Parser;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use cli::Cli;
use pipeline::{WorkflowOptions, run_workflow};
use scrapers::SourceConfig;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_filter()));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    debug!(?args, "Parsed CLI arguments");

    // ---- Source registry ----
    let mut registry = scrapers::default_sources();
    if let Some(path) = args.config.as_deref() {
        match config::load_config(path).await {
            Ok(config) => config.merge_into(&mut registry),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load source config");
                return ExitCode::FAILURE;
            }
        }
    }

    if args.list_sources {
        print_sources(&registry);
        return ExitCode::SUCCESS;
    }

    let selected = select_sources(&registry, args.sources.as_deref());
    if selected.is_empty() {
        error!("No valid sources specified. Exiting without scraping.");
        return ExitCode::FAILURE;
    }

    // Early check: ensure the JSON output directory is writable
    if !args.dry_run {
        let dir = match args.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => std::path::Path::new("."),
        };
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return ExitCode::FAILURE;
        }
    }

    let options = WorkflowOptions {
        timeout: Duration::from_secs(args.timeout),
        output: Some(args.output.clone()),
        dry_run: args.dry_run,
        google_sheet_id: args.google_sheet_id.clone(),
        worksheet_id: args.worksheet_id,
        google_credentials: args.google_credentials.clone(),
        sheet_mode: args.sheet_mode,
    };

    let result = run_workflow(&selected, &options).await;

    let elapsed = start_time.elapsed();
    match result {
        Ok(deals) => {
            info!(
                count = deals.len(),
                sources = selected.len(),
                secs = elapsed.as_secs(),
                millis = elapsed.subsec_millis(),
                "Execution complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, secs = elapsed.as_secs(), "Persisting deals failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolve requested source keys against the registry.
///
/// `None` selects every registered source. Unknown keys are logged and
/// skipped; order follows the request.
fn select_sources(
    registry: &BTreeMap<String, SourceConfig>,
    requested: Option<&[String]>,
) -> Vec<SourceConfig> {
    let Some(requested) = requested else {
        return registry.values().cloned().collect();
    };

    requested
        .iter()
        .filter_map(|key| match registry.get(key) {
            Some(source) => Some(source.clone()),
            None => {
                error!(
                    source = %key,
                    available = %registry.keys().join(", "),
                    "Unknown source"
                );
                None
            }
        })
        .collect()
}

fn print_sources(registry: &BTreeMap<String, SourceConfig>) {
    if registry.is_empty() {
        warn!("No sources registered");
    }
    for source in registry.values() {
        println!("{:<20} {:<5} {}  ({})", source.key, source.parser, source.url, source.name);
        if let Some(notes) = &source.notes {
            println!("{:<26}{}", "", notes);
        }
    }
}
