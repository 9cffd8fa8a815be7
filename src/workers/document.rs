//! Local document extraction
//!
//! Pulls applicant and loan fields out of mortgage application text. When the
//! request names a document file, its text is loaded first.

use super::extract::{
    amount_value, capture_amount, capture_text, credit_score_from_text, income_from_text,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const DOCUMENT_AGENT: &str = "DocumentAgent";

/// Failure to obtain text for a referenced document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document file '{0}' not found")]
    NotFound(String),
    #[error("Could not extract text from '{0}'")]
    Unreadable(String),
}

/// Source of document text
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, reference: &str) -> Result<String, DocumentError>;
}

/// Reads UTF-8 documents from disk, relative to an optional base directory
#[derive(Debug, Clone, Default)]
pub struct FsDocumentLoader {
    base_dir: Option<PathBuf>,
}

impl FsDocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl DocumentLoader for FsDocumentLoader {
    async fn load(&self, reference: &str) -> Result<String, DocumentError> {
        let path = self.resolve(reference);
        debug!(path = %path.display(), "Loading document");

        match tokio::fs::read_to_string(&path).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Err(DocumentError::Unreadable(reference.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DocumentError::NotFound(reference.to_string()))
            }
            Err(_) => Err(DocumentError::Unreadable(reference.to_string())),
        }
    }
}

static FILE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)([\w./-]+\.(?:pdf|txt|md))\b"));

static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        pattern(r"(?im)(?:applicant|borrower)?\s*name:\s*([A-Za-z][A-Za-z ]{1,40}?)\s*(?:social|$)"),
        pattern(r"(?im)primary\s*borrower:\s*([A-Za-z][A-Za-z ]{1,40}?)\s*$"),
    ]
});

static MONTHLY_INCOME: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![pattern(r"(?i)monthly\s*income:\s*\$?(\d[\d,]*)")]);

static ANNUAL_INCOME: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![pattern(r"(?i)(?:annual|yearly)\s*income:\s*\$?(\d[\d,]*)")]);

static EMPLOYMENT: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![pattern(r"(?im)(?:employer|position):\s*(.+?)\s*$")]);

static LOAN_AMOUNT: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        pattern(r"(?i)requested\s*loan\s*amount:\s*\$?(\d[\d,]*)"),
        pattern(r"(?i)loan\s*amount[:\s]*(?:of\s+)?\$?(\d[\d,]*)"),
        pattern(r"(?i)\$?(\d[\d,]*)\s*loan\b"),
    ]
});

static PROPERTY_VALUE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        pattern(r"(?i)purchase\s*price:\s*\$?(\d[\d,]*)"),
        pattern(r"(?i)property\s*value[:\s]*(?:of\s+)?\$?(\d[\d,]*)"),
        pattern(r"(?i)sale\s*price:\s*\$?(\d[\d,]*)"),
    ]
});

static DOWN_PAYMENT: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![pattern(r"(?i)down\s*payment[:\s]*\$?(\d[\d,]*)")]);

static PROPERTY_ADDRESS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![pattern(r"(?im)property\s*address:\s*(.+?)\s*$")]);

static LIABILITIES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        pattern(r"(?i)credit\s*card\s*debt:\s*\$?(\d[\d,]*)"),
        pattern(r"(?i)car\s*loan:\s*\$?(\d[\d,]*)"),
        pattern(r"(?i)current\s*mortgage:\s*\$?(\d[\d,]*)"),
    ]
});

static ASSETS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        pattern(r"(?i)checking\s*account:\s*\$?(\d[\d,]*)"),
        pattern(r"(?i)savings\s*account:\s*\$?(\d[\d,]*)"),
        pattern(r"(?i)retirement\s*account:\s*\$?(\d[\d,]*)"),
    ]
});

static START_DATE: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)start\s*date:\s*(\d{2}/\d{2}/\d{4})"));

fn pattern(p: &str) -> Regex {
    Regex::new(p).unwrap_or_else(|e| panic!("invalid document pattern {p}: {e}"))
}

/// Monthly payment assumed per unit of outstanding liability balance
const LIABILITY_PAYMENT_RATE: f64 = 0.03;

const NOT_SPECIFIED: &str = "Not specified";

/// First document file named in the request text
pub fn referenced_document(text: &str) -> Option<String> {
    FILE_REFERENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Run the document stage over request text
pub async fn document_stage(loader: &dyn DocumentLoader, text: &str) -> Map<String, Value> {
    let (source, source_file) = match referenced_document(text) {
        Some(file) => match loader.load(&file).await {
            Ok(content) => {
                info!(file = %file, chars = content.len(), "Loaded document for extraction");
                (content, Some(file))
            }
            Err(e) => {
                let mut slot = Map::new();
                slot.insert("error".to_string(), Value::String(e.to_string()));
                return slot;
            }
        },
        None => (text.to_string(), None),
    };

    let mut result = extract_application_fields(&source);
    if let Some(file) = source_file {
        result.insert("source_file".to_string(), Value::String(file));
    }
    result
}

/// Field heuristics over mortgage application text
pub fn extract_application_fields(text: &str) -> Map<String, Value> {
    let monthly_income = capture_amount(text, &MONTHLY_INCOME);
    let income = monthly_income
        .map(|m| m * 12.0)
        .or_else(|| capture_amount(text, &ANNUAL_INCOME))
        .or_else(|| income_from_text(text))
        .unwrap_or(0.0);

    let monthly_debt: f64 = LIABILITIES
        .iter()
        .filter_map(|re| capture_amount(text, std::slice::from_ref(re)))
        .map(|balance| (balance * LIABILITY_PAYMENT_RATE).floor())
        .sum();

    let assets: f64 = ASSETS
        .iter()
        .filter_map(|re| capture_amount(text, std::slice::from_ref(re)))
        .sum();

    let mut fields = object(json!({
        "applicant_name": applicant_name(text),
        "income": amount_value(income),
        "employment": capture_text(text, &EMPLOYMENT).unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        "credit_score": amount_value(credit_score_from_text(text).unwrap_or(0.0)),
        "loan_amount": amount_value(capture_amount(text, &LOAN_AMOUNT).unwrap_or(0.0)),
        "property_value": amount_value(capture_amount(text, &PROPERTY_VALUE).unwrap_or(0.0)),
        "down_payment": amount_value(capture_amount(text, &DOWN_PAYMENT).unwrap_or(0.0)),
        "property_address": capture_text(text, &PROPERTY_ADDRESS)
            .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        "document_type": "Mortgage Application",
        "extracted_data": {
            "monthly_income": amount_value(monthly_income.unwrap_or(0.0)),
            "monthly_debt": amount_value(monthly_debt),
            "assets": amount_value(assets),
            "employment_years": employment_years(text),
        },
        "agent": DOCUMENT_AGENT,
    }));

    let found = ["income", "credit_score", "loan_amount", "property_value"]
        .iter()
        .filter(|k| fields.get(**k).and_then(Value::as_f64).unwrap_or(0.0) > 0.0)
        .count();
    let completeness = match found {
        4 => "Complete extraction from structured document",
        0 => "No financial fields found",
        _ => "Partial extraction",
    };
    fields.insert(
        "completeness".to_string(),
        Value::String(completeness.to_string()),
    );

    fields
}

fn applicant_name(text: &str) -> String {
    capture_text(text, &NAME_PATTERNS)
        .map(|name| {
            name.split_whitespace()
                .take(2)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|name| name.len() > 1)
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

fn employment_years(text: &str) -> f64 {
    START_DATE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%m/%d/%Y").ok())
        .map(|start| {
            let days = (Utc::now().date_naive() - start).num_days() as f64;
            ((days / 365.25) * 10.0).round() / 10.0
        })
        .unwrap_or(0.0)
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
