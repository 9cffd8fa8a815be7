//! LLM-backed route classification
//!
//! The classifier asks the text-generation service for exactly one route
//! label. Anything it cannot interpret, including provider failures, falls
//! open to `full_pipeline`.

use crate::agent::route_decision::RouteLabel;
use crate::llm::provider::{CompletionRequest, LlmProvider, Message};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are a mortgage workflow router. \
Reply with a single routing option and nothing else.";

/// Picks a [`RouteLabel`] for an incoming task
pub struct Classifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Classifier {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: Some(16),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Prompt listing the worker roles and the four permitted answers
    pub fn build_prompt(task_text: &str) -> String {
        let options = RouteLabel::ALL
            .iter()
            .map(|label| format!("- {label}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Analyze this query and determine which mortgage processing agents should be involved:\n\n\
             Query: {task_text}\n\n\
             Available agents:\n\
             - document_agent: extracts applicant data from mortgage application documents\n\
             - risk_agent: performs credit risk assessment\n\
             - compliance_agent: checks regulatory compliance\n\n\
             Routing options:\n{options}\n\n\
             Return only one of these routing options."
        )
    }

    fn build_completion_request(&self, task_text: &str) -> CompletionRequest {
        CompletionRequest::new(
            self.model.clone(),
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(Self::build_prompt(task_text)),
            ],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
        .with_metadata("purpose", "route_classification")
    }

    /// Classify `task_text`; never fails
    pub async fn decide(&self, task_text: &str) -> RouteLabel {
        let request = self.build_completion_request(task_text);
        debug!(model = %self.model, provider = self.provider.name(), "Requesting route label");

        let content = match self.provider.complete(request).await {
            Ok(response) => response.content.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Route classification failed, using full pipeline");
                return RouteLabel::FullPipeline;
            }
        };

        match RouteLabel::normalize(&content) {
            Some(label) => {
                info!(route = %label, "Route selected");
                label
            }
            None => {
                warn!(
                    response = %content,
                    "Unrecognised route label, using full pipeline"
                );
                RouteLabel::FullPipeline
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockLlmProvider;

    fn classifier(provider: MockLlmProvider) -> Classifier {
        Classifier::new(Arc::new(provider), "test-model")
    }

    #[test]
    fn test_prompt_lists_every_option() {
        let prompt = Classifier::build_prompt("Check compliance");
        assert!(prompt.contains("Query: Check compliance"));
        for label in RouteLabel::ALL {
            assert!(prompt.contains(label.as_str()));
        }
        assert!(prompt.ends_with("Return only one of these routing options."));
    }

    #[tokio::test]
    async fn test_decide_accepts_each_label() {
        for label in RouteLabel::ALL {
            let c = classifier(MockLlmProvider::single_response(label.as_str()));
            assert_eq!(c.decide("anything").await, label);
        }
    }

    #[tokio::test]
    async fn test_decide_normalizes_decorated_reply() {
        let c = classifier(MockLlmProvider::single_response("  `Risk_Only`.\n"));
        assert_eq!(c.decide("assess risk").await, RouteLabel::RiskOnly);
    }

    #[tokio::test]
    async fn test_unknown_reply_falls_open() {
        let c = classifier(MockLlmProvider::single_response("risk and compliance please"));
        assert_eq!(c.decide("x").await, RouteLabel::FullPipeline);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_open() {
        let c = classifier(MockLlmProvider::failing());
        assert_eq!(c.decide("x").await, RouteLabel::FullPipeline);
    }

    #[tokio::test]
    async fn test_request_carries_model_and_temperature() {
        let provider = Arc::new(MockLlmProvider::single_response("document_only"));
        let c = Classifier::new(provider.clone(), "router-model").with_temperature(0.2);
        c.decide("extract the document").await;

        let requests = provider.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "router-model");
        assert_eq!(requests[0].temperature, Some(0.2));
        assert!(requests[0].messages[1]
            .content
            .contains("extract the document"));
    }
}
