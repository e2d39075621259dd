//! Dealflow sources and the parsers that understand them.
//!
//! A source is registered as a [`SourceConfig`]: a key used on the command
//! line, a display name, the URL to fetch and the [`ParserKind`] that turns
//! the response body into [`RawDeal`] records.
//!
//! # Supported Parsers
//!
//! | Parser | Module | Input |
//! |--------|--------|-------|
//! | `json` | [`json_feed`] | JSON array of startup objects |
//! | `html` | [`html_listing`] | HTML directory page, driven by CSS selectors |
//! | `rss`  | [`rss_feed`] | RSS 2.0 or Atom feed |
//!
//! # Adding a Source
//!
//! Either add an entry to [`default_sources`] or declare it in the YAML
//! config file (see [`crate::config`]). A new response format needs a new
//! parser module and a [`ParserKind`] variant.

pub mod html_listing;
pub mod json_feed;
pub mod rss_feed;

use crate::models::RawDeal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default HTTP timeout applied to every source request, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Response formats a source can be parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    Json,
    Html,
    Rss,
}

impl ParserKind {
    /// Parse a response body with the parser this kind stands for.
    pub fn parse(self, body: &str, source: &SourceConfig) -> Vec<RawDeal> {
        match self {
            ParserKind::Json => json_feed::parse(body, source),
            ParserKind::Html => html_listing::parse(body, source),
            ParserKind::Rss => rss_feed::parse(body, source),
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParserKind::Json => "json",
            ParserKind::Html => "html",
            ParserKind::Rss => "rss",
        };
        f.pad(name)
    }
}

/// Configuration for a single dealflow source.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Identifier used with `--sources`.
    pub key: String,
    /// Human readable name; also the default `fuente_datos` of its records.
    pub name: String,
    /// HTTP(S) endpoint to fetch.
    pub url: String,
    /// How the response body is interpreted.
    pub parser: ParserKind,
    /// Free-form onboarding notes (auth quirks, rate limits, ...).
    #[serde(default)]
    pub notes: Option<String>,
    /// CSS selectors, required by the `html` parser.
    #[serde(default)]
    pub selectors: Option<html_listing::HtmlSelectors>,
}

impl SourceConfig {
    /// Parse a fetched body with this source's parser.
    pub fn parse(&self, body: &str) -> Vec<RawDeal> {
        self.parser.parse(body, self)
    }
}

/// Sources available without a config file, keyed by [`SourceConfig::key`].
pub fn default_sources() -> BTreeMap<String, SourceConfig> {
    let sample = SourceConfig {
        key: "sample_api".to_string(),
        name: "Sample Startup API".to_string(),
        url: "https://example.com/api/deals.json".to_string(),
        parser: ParserKind::Json,
        notes: Some(
            "Replace this entry with the actual API endpoint you want to scrape. \
             To add more sources, declare them in the config file with the parser \
             that knows how to interpret the response."
                .to_string(),
        ),
        selectors: None,
    };

    BTreeMap::from([(sample.key.clone(), sample)])
}

/// Build the HTTP client shared by all source fetches.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Retrieve the text body of a URL.
///
/// Redirects are followed; non-success status codes are errors. The body
/// is decoded with the charset from the response headers, UTF-8 otherwise.
#[instrument(level = "debug", skip(client))]
pub async fn fetch_url(client: &reqwest::Client, url: &str) -> Result<String, Box<dyn Error>> {
    debug!(%url, "Fetching URL");
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.text().await?;
    debug!(bytes = body.len(), "Fetched URL");
    Ok(body)
}
