//! Command-line interface definitions for the dealflow scraper.
//!
//! All options can be given as flags; the sheet id, credentials and config
//! path also fall back to environment variables.

use crate::outputs::sheets::SheetMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Console logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// `EnvFilter` directive for this level. tracing has no critical level,
    /// so it maps to `error`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// Scrape startup dealflow data from multiple sources.
///
/// # Examples
///
/// ```sh
/// # Every registered source into dealflow.json
/// dealflow_scraper
///
/// # One source, no files written
/// dealflow_scraper --sources sample_api --dry-run
///
/// # Also push to a worksheet
/// dealflow_scraper --google-sheet-id 1AbC... --worksheet-id 0 \
///     --google-credentials service-account.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Keys of the sources to scrape (default: all registered sources; see --list-sources)
    #[arg(long, num_args = 0..)]
    pub sources: Option<Vec<String>>,

    /// HTTP request timeout (seconds)
    #[arg(long, default_value_t = crate::scrapers::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Path to write the collected dealflow JSON payload
    #[arg(short, long, default_value = "dealflow.json")]
    pub output: PathBuf,

    /// Collect data without writing it anywhere
    #[arg(long)]
    pub dry_run: bool,

    /// Destination Google Sheets document ID, or the full sheet URL
    #[arg(long, env = "GOOGLE_SHEET_ID")]
    pub google_sheet_id: Option<String>,

    /// Destination worksheet gid within the Google Sheet
    #[arg(long)]
    pub worksheet_id: Option<i64>,

    /// Path to a Google service account JSON file for sheet access
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub google_credentials: Option<PathBuf>,

    /// Whether to replace the worksheet contents or append below them
    #[arg(long, value_enum, default_value_t = SheetMode::Replace)]
    pub sheet_mode: SheetMode,

    /// Console logging verbosity (RUST_LOG takes precedence)
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Optional YAML file declaring additional sources
    #[arg(short, long, env = "DEALFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the registered sources and exit
    #[arg(long)]
    pub list_sources: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["dealflow_scraper"]);

        assert_eq!(cli.sources, None);
        assert_eq!(cli.timeout, 10);
        assert_eq!(cli.output, PathBuf::from("dealflow.json"));
        assert!(!cli.dry_run);
        assert_eq!(cli.worksheet_id, None);
        assert_eq!(cli.sheet_mode, SheetMode::Replace);
        assert_eq!(cli.log_level, LogLevel::Info);
        assert!(!cli.list_sources);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "dealflow_scraper",
            "--sources",
            "sample_api",
            "accelerator_feed",
            "--timeout",
            "3",
            "--output",
            "/tmp/deals.json",
            "--dry-run",
            "--google-sheet-id",
            "sheet123",
            "--worksheet-id",
            "42",
            "--sheet-mode",
            "append",
            "--log-level",
            "DEBUG",
        ]);

        assert_eq!(
            cli.sources,
            Some(vec!["sample_api".to_string(), "accelerator_feed".to_string()])
        );
        assert_eq!(cli.timeout, 3);
        assert_eq!(cli.output, PathBuf::from("/tmp/deals.json"));
        assert!(cli.dry_run);
        assert_eq!(cli.google_sheet_id.as_deref(), Some("sheet123"));
        assert_eq!(cli.worksheet_id, Some(42));
        assert_eq!(cli.sheet_mode, SheetMode::Append);
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_cli_rejects_unknown_log_level() {
        assert!(Cli::try_parse_from(["dealflow_scraper", "--log-level", "trace"]).is_err());
    }

    #[test]
    fn test_log_level_filters() {
        assert_eq!(LogLevel::Critical.as_filter(), "error");
        assert_eq!(LogLevel::Warning.as_filter(), "warn");
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
    }
}
