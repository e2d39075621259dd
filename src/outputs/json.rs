//! JSON file output.
//!
//! The collected records are written as one pretty-printed JSON array,
//! non-ASCII text kept as-is:
//!
//! ```text
//! [
//!   {
//!     "id": "u-1",
//!     "nombre": "AquaGrow",
//!     ...
//!     "scraped_at": 1700000000
//!   }
//! ]
//! ```

use crate::models::Deal;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write normalised deals to a JSON file, creating parent directories.
///
/// # Output Path
///
/// The file at `output_path` is replaced; an empty collection writes `[]`.
#[instrument(level = "info", skip_all, fields(path = %output_path.display()))]
pub async fn persist_to_json(deals: &[Deal], output_path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(deals)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    fs::write(output_path, json).await?;
    let resolved = fs::canonicalize(output_path)
        .await
        .unwrap_or_else(|_| output_path.to_path_buf());
    info!(count = deals.len(), path = %resolved.display(), "Persisted deals");

    Ok(())
}
