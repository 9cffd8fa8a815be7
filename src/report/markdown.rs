//! Markdown decision report

use super::{clean_applicant_name, ReportError, ReportRenderer, UNKNOWN_APPLICANT};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing::info;

const NOT_SPECIFIED: &str = "Not specified";

/// Writes `compliance_report_<YYYYMMDD_HHMM>_<name>.md` files into one directory
#[derive(Debug, Clone)]
pub struct MarkdownReportRenderer {
    output_dir: PathBuf,
}

impl MarkdownReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name for a report generated at `now`
    pub fn file_name(applicant_name: &str, now: DateTime<Local>) -> String {
        format!(
            "compliance_report_{}_{}.md",
            now.format("%Y%m%d_%H%M"),
            clean_applicant_name(applicant_name)
        )
    }

    /// Markdown body for `final_result`
    pub fn render_markdown(final_result: &Map<String, Value>, now: DateTime<Local>) -> String {
        let mut out = String::new();
        match write_report(&mut out, final_result, now) {
            Ok(()) => out,
            Err(_) => String::new(),
        }
    }
}

fn write_report(
    out: &mut String,
    final_result: &Map<String, Value>,
    now: DateTime<Local>,
) -> fmt::Result {
    let empty = Map::new();
    let document = section(final_result, "document_data").unwrap_or(&empty);
    let risk = section(final_result, "risk_assessment").unwrap_or(&empty);
    let compliance = section(final_result, "compliance_result").unwrap_or(&empty);
    let applicant = document
        .get("applicant_name")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_APPLICANT);

    writeln!(out, "# Mortgage Application Decision Report\n")?;

    table_header(out, "## Report Information")?;
    row(
        out,
        "Report Generated",
        &now.format("%B %d, %Y at %I:%M %p").to_string(),
    )?;
    row(out, "Applicant Name", applicant)?;
    let source = document
        .get("source_file")
        .and_then(Value::as_str)
        .map(display_file_name)
        .unwrap_or_else(|| "N/A".to_string());
    row(out, "Source Document", &source)?;
    row(out, "Report ID", &now.format("%Y%m%d_%H%M").to_string())?;
    out.push('\n');

    table_header(out, "## Application Summary")?;
    row(out, "Annual Income", &format!("${}", field(document, "income")))?;
    row(out, "Employment", &field(document, "employment"))?;
    row(out, "Loan Amount", &format!("${}", field(document, "loan_amount")))?;
    row(out, "Credit Score", &credit_score(risk, document))?;
    out.push('\n');

    table_header(out, "## Risk Assessment")?;
    let level = risk
        .get("risk_level")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_uppercase();
    row(out, "Risk Level", &level)?;
    row(out, "Risk Score", &format!("{}/100", or_na(risk, "risk_score")))?;
    row(out, "Confidence", &or_na(risk, "confidence"))?;
    row(
        out,
        "Debt-to-Income Ratio",
        &format!("{}%", or_na(risk, "debt_to_income_ratio")),
    )?;
    out.push('\n');
    write_bullets(out, "### Risk Factors", risk.get("risk_factors"))?;

    let approved = compliance
        .get("approved")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let decision = if approved {
        "**APPROVED**"
    } else {
        "**NOT APPROVED**"
    };
    table_header(out, "## Compliance Decision")?;
    row(out, "Decision", decision)?;
    row(out, "Confidence", &or_na(compliance, "confidence"))?;
    out.push('\n');
    write_bullets(
        out,
        "### Compliance Issues",
        compliance.get("compliance_issues"),
    )?;
    write_bullets(out, "## Recommendations", compliance.get("recommendations"))?;

    if let Some(summary) = final_result
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
    {
        writeln!(out, "## Executive Summary\n\n{}\n", summary.trim())?;
    }

    Ok(())
}

#[async_trait]
impl ReportRenderer for MarkdownReportRenderer {
    async fn render(&self, final_result: &Map<String, Value>) -> Result<PathBuf, ReportError> {
        let now = Local::now();
        let applicant = final_result
            .get("document_data")
            .and_then(|d| d.get("applicant_name"))
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_APPLICANT);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| ReportError::CreateDir {
                path: self.output_dir.clone(),
                source,
            })?;

        let path = self.output_dir.join(Self::file_name(applicant, now));
        let body = Self::render_markdown(final_result, now);
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| ReportError::Write {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), "Decision report written");
        Ok(path)
    }
}

fn section<'a>(result: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    result.get(key).and_then(Value::as_object)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .map(scalar)
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

fn or_na(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).map(scalar).unwrap_or_else(|| "N/A".to_string())
}

/// Risk assessment wins; a positive document score is the fallback
fn credit_score(risk: &Map<String, Value>, document: &Map<String, Value>) -> String {
    if let Some(score) = risk.get("credit_score") {
        return scalar(score);
    }
    match document.get("credit_score") {
        Some(score) if score.as_f64().is_some_and(|s| s > 0.0) => scalar(score),
        _ => NOT_SPECIFIED.to_string(),
    }
}

fn display_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn write_bullets(out: &mut String, heading: &str, items: Option<&Value>) -> fmt::Result {
    let Some(items) = items.and_then(Value::as_array).filter(|a| !a.is_empty()) else {
        return Ok(());
    };
    writeln!(out, "{heading}\n")?;
    for item in items {
        writeln!(out, "- {}", single_line(&scalar(item)))?;
    }
    out.push('\n');
    Ok(())
}

fn table_header(out: &mut String, heading: &str) -> fmt::Result {
    writeln!(out, "{heading}\n")?;
    writeln!(out, "| Field | Value |\n|---|---|")
}

fn row(out: &mut String, label: &str, value: &str) -> fmt::Result {
    writeln!(out, "| {label} | {} |", table_cell(value))
}

/// Whitespace runs, line breaks included, collapsed to single spaces
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One line with pipes escaped, safe inside a table row
fn table_cell(value: &str) -> String {
    single_line(value).replace('|', "\\|")
}
