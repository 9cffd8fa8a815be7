//! In-process stand-ins for the remote worker agents
//!
//! Each stage function takes the same input the remote call would have been
//! built from and returns the same slot shape the remote worker's reply yields.

pub mod compliance;
pub mod credit_risk;
pub mod document;
pub mod extract;

pub use document::{DocumentError, DocumentLoader, FsDocumentLoader};

use serde_json::{Map, Value};
use std::sync::Arc;

/// What a stage consumes: the previous stage's slot, or the task text
#[derive(Debug, Clone, PartialEq)]
pub enum StageInput {
    Text(String),
    Data(Map<String, Value>),
}

impl StageInput {
    /// JSON rendering used when the input is sent to a remote worker
    pub fn render(&self) -> String {
        match self {
            StageInput::Text(text) => text.clone(),
            StageInput::Data(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, StageInput::Data(_))
    }
}

/// Local implementations of the document, risk and compliance stages
#[derive(Clone)]
pub struct LocalFallbackExecutor {
    loader: Arc<dyn DocumentLoader>,
}

impl std::fmt::Debug for LocalFallbackExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFallbackExecutor").finish_non_exhaustive()
    }
}

impl Default for LocalFallbackExecutor {
    fn default() -> Self {
        Self::new(Arc::new(FsDocumentLoader::new()))
    }
}

impl LocalFallbackExecutor {
    pub fn new(loader: Arc<dyn DocumentLoader>) -> Self {
        Self { loader }
    }

    /// Document processing always opens the pipeline, so it only sees the task text
    pub async fn document_stage(&self, task_text: &str) -> Map<String, Value> {
        document::document_stage(self.loader.as_ref(), task_text).await
    }

    pub fn risk_stage(&self, input: &StageInput) -> Map<String, Value> {
        match input {
            StageInput::Text(text) => credit_risk::risk_stage_from_text(text),
            StageInput::Data(map) => credit_risk::risk_stage_from_map(map),
        }
    }

    pub fn compliance_stage(&self, input: &StageInput) -> Map<String, Value> {
        match input {
            StageInput::Text(text) => compliance::compliance_stage_from_text(text),
            StageInput::Data(map) => compliance::compliance_stage_from_map(map),
        }
    }
}
