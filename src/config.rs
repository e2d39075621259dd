//! Optional YAML file declaring extra dealflow sources.
//!
//! ```yaml
//! sources:
//!   - key: accelerator_feed
//!     name: Accelerator Feed
//!     url: https://accelerator.example/feed.xml
//!     parser: rss
//!   - key: directory
//!     name: Startup Directory
//!     url: https://directory.example/list
//!     parser: html
//!     selectors:
//!       item: ".startup-card"
//!       fields:
//!         nombre: "h3"
//! ```
//!
//! Entries whose key matches a built-in source replace it.

use crate::scrapers::{ParserKind, SourceConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument, warn};
use url::Url;

/// Contents of the config file.
#[derive(Debug, Default, Deserialize)]
pub struct ScraperConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl ScraperConfig {
    /// Parse and validate YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, Box<dyn Error>> {
        let config: ScraperConfig = serde_yaml::from_str(text)?;
        for source in &config.sources {
            validate_source(source)?;
        }
        Ok(config)
    }

    /// Merge these sources into `registry`, replacing entries with the same key.
    pub fn merge_into(self, registry: &mut BTreeMap<String, SourceConfig>) {
        for source in self.sources {
            if registry.contains_key(&source.key) {
                info!(key = %source.key, "Config overrides built-in source");
            }
            registry.insert(source.key.clone(), source);
        }
    }
}

/// Load and validate the config file at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_config(path: &Path) -> Result<ScraperConfig, Box<dyn Error>> {
    let text = tokio::fs::read_to_string(path).await?;
    let config = ScraperConfig::from_yaml(&text)?;
    info!(sources = config.sources.len(), "Loaded source config");
    Ok(config)
}

fn validate_source(source: &SourceConfig) -> Result<(), Box<dyn Error>> {
    if source.key.trim().is_empty() {
        return Err(format!("source {:?} has an empty key", source.name).into());
    }

    let url = Url::parse(&source.url)
        .map_err(|e| format!("source {}: invalid url {:?}: {e}", source.key, source.url))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("source {}: url must be http(s), got {}", source.key, url.scheme()).into());
    }

    if source.parser == ParserKind::Html {
        let Some(selectors) = source.selectors.as_ref() else {
            return Err(format!("source {}: html parser requires selectors", source.key).into());
        };
        selectors
            .compile()
            .map_err(|e| format!("source {}: {e}", source.key))?;
        let unknown = selectors.unknown_fields();
        if !unknown.is_empty() {
            warn!(key = %source.key, fields = ?unknown, "Selectors for unknown columns are ignored by the output schema");
        }
    }

    Ok(())
}
