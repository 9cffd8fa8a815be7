//! Mock implementations for testing
//!
//! Scripted stand-ins for the text-generation service, the document loader
//! and the report renderer so the pipeline can be exercised without network
//! access or a filesystem.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::report::{ReportError, ReportRenderer};
use crate::workers::{DocumentError, DocumentLoader};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock LLM provider for testing
///
/// Replies are taken from `purpose_responses` when the request carries a
/// matching `purpose` metadata entry, otherwise from `responses` in rotation.
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub purpose_responses: HashMap<String, String>,
    pub current_response: Arc<Mutex<usize>>,
    pub received: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Answer route classification with `label` and summaries with `summary`
    pub fn routing(label: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::default()
            .with_purpose_response("route_classification", label)
            .with_purpose_response("workflow_summary", summary)
    }

    pub fn with_purpose_response(
        mut self,
        purpose: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.purpose_responses
            .insert(purpose.into(), response.into());
        self
    }

    /// Requests seen so far, in arrival order
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.received.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.received.lock().await.len()
    }

    async fn next_rotating(&self) -> Option<String> {
        if self.responses.is_empty() {
            return None;
        }
        let mut current = self.current_response.lock().await;
        let response = self.responses[*current % self.responses.len()].clone();
        *current += 1;
        Some(response)
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.received.lock().await.push(request.clone());

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let scripted = request
            .metadata
            .get("purpose")
            .and_then(|purpose| self.purpose_responses.get(purpose))
            .cloned();
        let content = match scripted {
            Some(content) => content,
            None => self
                .next_rotating()
                .await
                .unwrap_or_else(|| "Mock response".to_string()),
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: request.model,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: request.metadata,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// In-memory document store keyed by file reference
#[derive(Debug, Default, Clone)]
pub struct MockDocumentLoader {
    pub documents: HashMap<String, String>,
}

impl MockDocumentLoader {
    pub fn with_document(mut self, reference: impl Into<String>, text: impl Into<String>) -> Self {
        self.documents.insert(reference.into(), text.into());
        self
    }
}

#[async_trait]
impl DocumentLoader for MockDocumentLoader {
    async fn load(&self, reference: &str) -> Result<String, DocumentError> {
        self.documents
            .get(reference)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(reference.to_string()))
    }
}

/// Report renderer that records what it was given and optionally fails
#[derive(Debug, Default)]
pub struct MockReportRenderer {
    pub rendered: Arc<Mutex<Vec<Map<String, Value>>>>,
    pub should_fail: bool,
}

impl MockReportRenderer {
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn rendered(&self) -> Vec<Map<String, Value>> {
        self.rendered.lock().await.clone()
    }
}

#[async_trait]
impl ReportRenderer for MockReportRenderer {
    async fn render(&self, final_result: &Map<String, Value>) -> Result<PathBuf, ReportError> {
        let path = PathBuf::from("mock-reports/report.md");
        if self.should_fail {
            return Err(ReportError::Write {
                path,
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.rendered.lock().await.push(final_result.clone());
        Ok(path)
    }
}
