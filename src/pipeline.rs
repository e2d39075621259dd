//! End-to-end scraping workflow.
//!
//! 1. **Fetching**: one GET per selected source, in order
//! 2. **Parsing**: the source's parser turns the body into raw records
//! 3. **Normalising**: every record is mapped onto the output schema
//! 4. **Output**: JSON file and/or Google Sheets, unless this is a dry run
//!
//! A source that fails to fetch is logged and skipped; the rest still run.
//! Sink failures are returned to the caller.

use crate::models::Deal;
use crate::normalize::normalise_deal;
use crate::outputs::json::persist_to_json;
use crate::outputs::sheets::{SheetMode, SheetTarget, parse_sheet_reference, persist_to_google_sheet};
use crate::scrapers::{SourceConfig, build_client, fetch_url};
use crate::utils::unix_now;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Knobs for one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// HTTP timeout applied to each source request.
    pub timeout: Duration,
    /// JSON file to write; `None` disables the JSON sink.
    pub output: Option<PathBuf>,
    /// Collect without persisting anything.
    pub dry_run: bool,
    /// Spreadsheet id or full sheet URL.
    pub google_sheet_id: Option<String>,
    /// Worksheet `gid`; falls back to the `gid` of a pasted sheet URL.
    pub worksheet_id: Option<i64>,
    pub google_credentials: Option<PathBuf>,
    pub sheet_mode: SheetMode,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::scrapers::DEFAULT_TIMEOUT_SECS),
            output: None,
            dry_run: false,
            google_sheet_id: None,
            worksheet_id: None,
            google_credentials: None,
            sheet_mode: SheetMode::Replace,
        }
    }
}

/// Scrape `sources` in order, normalise the records and hand them to the
/// configured sinks.
///
/// # Returns
///
/// Every collected [`Deal`], whether or not it was persisted.
#[instrument(level = "info", skip_all, fields(sources = sources.len(), dry_run = options.dry_run))]
pub async fn run_workflow(
    sources: &[SourceConfig],
    options: &WorkflowOptions,
) -> Result<Vec<Deal>, Box<dyn Error>> {
    let client = build_client(options.timeout)?;

    let collected: Vec<Deal> = stream::iter(sources)
        .then(|source| scrape_source(&client, source))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();
    info!(count = collected.len(), "Total deals collected");

    match options.output.as_deref() {
        Some(output) if !options.dry_run => persist_to_json(&collected, output).await?,
        _ if options.dry_run => {
            info!(count = collected.len(), "Dry run enabled; skipping persistence");
        }
        _ => {}
    }

    let reference = options
        .google_sheet_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(parse_sheet_reference);
    let worksheet_id = options
        .worksheet_id
        .or_else(|| reference.as_ref().and_then(|r| r.gid));

    match (reference, worksheet_id) {
        (Some(reference), Some(worksheet_id)) if !options.dry_run => {
            let target = SheetTarget {
                spreadsheet_id: reference.spreadsheet_id,
                worksheet_id,
            };
            persist_to_google_sheet(
                &collected,
                &target,
                options.google_credentials.as_deref(),
                options.sheet_mode,
            )
            .await?;
        }
        (Some(_), Some(_)) => {
            info!(count = collected.len(), "Dry run enabled; skipping Google Sheets upload");
        }
        (None, None) => {}
        _ => {
            warn!(
                "Google Sheets upload requested but missing configuration. \
                 Provide both --google-sheet-id and --worksheet-id."
            );
        }
    }

    Ok(collected)
}

/// Fetch, parse and normalise one source. Failures yield no deals.
#[instrument(level = "info", skip_all, fields(source = %source.key))]
async fn scrape_source(client: &reqwest::Client, source: &SourceConfig) -> Vec<Deal> {
    info!(name = %source.name, url = %source.url, "Scraping source");

    let body = match fetch_url(client, &source.url).await {
        Ok(body) => body,
        Err(e) => {
            error!(url = %source.url, error = %e, "Failed to fetch source");
            String::new()
        }
    };
    if body.is_empty() {
        warn!(name = %source.name, "No response received from source");
        return Vec::new();
    }

    let scraped_at = unix_now();
    let deals: Vec<Deal> = source
        .parse(&body)
        .iter()
        .map(|raw| normalise_deal(raw, scraped_at))
        .collect();
    info!(count = deals.len(), "Normalised deals from source");
    deals
}
