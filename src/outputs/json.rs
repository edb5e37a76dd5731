//! JSON output of a search run.
//!
//! # Output Structure
//!
//! Reports are grouped by date and named after the query:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── donald-trump.json
//!     └── climate.json
//! ```
//! A later run for the same query on the same day replaces the file.

use std::error::Error;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::SearchReport;
use crate::utils::slugify;

/// Path of the report file for `report` under `json_output_dir`.
pub fn report_path(report: &SearchReport, json_output_dir: &str) -> PathBuf {
    let name = match slugify(&report.query) {
        slug if slug.is_empty() => "query".to_string(),
        slug => slug,
    };
    Path::new(json_output_dir)
        .join(&report.local_date)
        .join(format!("{name}.json"))
}

/// Write a [`SearchReport`] as pretty-printed JSON and return its path.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_report(
    report: &SearchReport,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(report, json_output_dir);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = report.articles.len(), "Wrote JSON report");
    Ok(path)
}
