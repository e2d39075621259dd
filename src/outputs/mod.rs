//! Sinks for the collected dealflow records.
//!
//! # Submodules
//!
//! - [`json`]: writes all records to one JSON file
//! - [`sheets`]: writes all records into a Google Sheets worksheet
//!
//! Both sinks take the full, already normalised collection; neither keeps
//! state between runs.

pub mod json;
pub mod sheets;
