//! Decision report artifacts
//!
//! Rendering is optional and non-fatal: the aggregator records the artifact
//! path when a renderer succeeds and leaves it out otherwise.

pub mod markdown;

pub use markdown::MarkdownReportRenderer;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Report rendering errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to create report directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns an aggregated `final_result` into an artifact on disk
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Render the report and return where it was written
    async fn render(&self, final_result: &Map<String, Value>) -> Result<PathBuf, ReportError>;
}

/// Applicant name made safe for use in a file name
///
/// Keeps alphanumerics, spaces, `-` and `_`, trims trailing whitespace, turns
/// spaces into underscores and caps the result at 20 characters.
pub fn clean_applicant_name(name: &str) -> String {
    const MAX_NAME_LEN: usize = 20;

    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let cleaned: String = kept
        .trim_end()
        .replace(' ', "_")
        .chars()
        .take(MAX_NAME_LEN)
        .collect();

    if cleaned.is_empty() {
        UNKNOWN_APPLICANT.to_string()
    } else {
        cleaned
    }
}

pub const UNKNOWN_APPLICANT: &str = "Unknown_Applicant";
