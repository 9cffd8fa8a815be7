//! Final result assembly
//!
//! The summary and the report are optional extras: a failure in either is
//! logged and leaves a placeholder or omits the field, never the result.

use super::state::PipelineState;
use crate::error::{RouterError, RouterResult};
use crate::llm::provider::{CompletionRequest, LlmProvider, Message};
use crate::report::ReportRenderer;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const ROUTER_AGENT: &str = "RoutingAgent";
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable";

/// Produces the narrative `summary` of a workflow result
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, final_result: &Map<String, Value>) -> RouterResult<String>;
}

/// Summarizer backed by the text-generation service
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
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

    pub fn build_prompt(final_result: &Map<String, Value>) -> String {
        let rendered =
            serde_json::to_string_pretty(final_result).unwrap_or_else(|_| "{}".to_string());
        format!(
            "Summarize this mortgage processing workflow result:\n\n{rendered}\n\n\
             Provide a concise summary of:\n\
             1. What was processed\n\
             2. Key findings\n\
             3. Final recommendation\n\
             4. Any issues encountered"
        )
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, final_result: &Map<String, Value>) -> RouterResult<String> {
        let request = CompletionRequest::new(
            self.model.clone(),
            vec![Message::user(Self::build_prompt(final_result))],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
        .with_metadata("purpose", "workflow_summary");

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| RouterError::llm_error(e.to_string()))?;

        response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| RouterError::llm_error("empty summary"))
    }
}

/// Merges stage slots into `final_result`
#[derive(Default, Clone)]
pub struct ResultAggregator {
    summarizer: Option<Arc<dyn Summarizer>>,
    renderer: Option<Arc<dyn ReportRenderer>>,
}

impl std::fmt::Debug for ResultAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultAggregator")
            .field("summarizer", &self.summarizer.is_some())
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Slots plus `processing_summary`, before any optional extras
    pub fn base_result(state: &PipelineState) -> Map<String, Value> {
        let stages_run: Vec<&str> = state.executed.iter().map(|s| s.as_str()).collect();
        let fallback: Vec<&str> = state.fallback.iter().map(|s| s.as_str()).collect();

        let mut result = Map::new();
        result.insert("routing_decision".into(), json!(state.route.as_str()));
        result.insert(
            "document_data".into(),
            Value::Object(state.document_data.clone()),
        );
        result.insert(
            "risk_assessment".into(),
            Value::Object(state.risk_assessment.clone()),
        );
        result.insert(
            "compliance_result".into(),
            Value::Object(state.compliance_result.clone()),
        );
        result.insert(
            "processing_summary".into(),
            json!({
                "total_steps": state.total_steps(),
                "successful_steps": state.successful_steps(),
                "stages_run": stages_run,
                "fallback_stages": fallback,
                "agent": ROUTER_AGENT,
            }),
        );
        result
    }

    /// Build `final_result`, add the summary and report path when available
    pub async fn aggregate(&self, state: &PipelineState) -> Map<String, Value> {
        let mut result = Self::base_result(state);

        if let Some(summarizer) = &self.summarizer {
            let summary = match summarizer.summarize(&result).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(error = %e, "Summary generation failed");
                    SUMMARY_UNAVAILABLE.to_string()
                }
            };
            result.insert("summary".into(), Value::String(summary));
        }

        if let Some(renderer) = &self.renderer {
            match renderer.render(&result).await {
                Ok(path) => {
                    info!(path = %path.display(), "Report artifact attached");
                    result.insert(
                        "output_artifact".into(),
                        Value::String(path.display().to_string()),
                    );
                }
                Err(e) => warn!(error = %e, "Report rendering failed"),
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::pipeline::state::Stage;
    use crate::agent::route_decision::RouteLabel;
    use crate::testing::mocks::{MockLlmProvider, MockReportRenderer};

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn risk_only_state() -> PipelineState {
        let mut state = PipelineState::new("Assess credit risk", RouteLabel::RiskOnly);
        state.record(Stage::RiskAssessment, obj(json!({"risk_level": "low"})), true);
        state.record(
            Stage::ComplianceCheck,
            obj(json!({"error": "Compliance agent communication failed: HTTP 503"})),
            false,
        );
        state
    }

    #[test]
    fn test_base_result_shape() {
        let result = ResultAggregator::base_result(&risk_only_state());

        assert_eq!(result["routing_decision"], "risk_only");
        assert_eq!(result["document_data"], json!({}));
        assert_eq!(result["risk_assessment"]["risk_level"], "low");
        let summary = &result["processing_summary"];
        assert_eq!(summary["total_steps"], 2);
        assert_eq!(summary["successful_steps"], 1);
        assert_eq!(
            summary["stages_run"],
            json!(["risk_assessment", "compliance_check"])
        );
        assert_eq!(summary["fallback_stages"], json!(["risk_assessment"]));
        assert_eq!(summary["agent"], ROUTER_AGENT);
    }

    #[tokio::test]
    async fn test_aggregate_without_extras() {
        let result = ResultAggregator::new().aggregate(&risk_only_state()).await;
        assert!(!result.contains_key("summary"));
        assert!(!result.contains_key("output_artifact"));
    }

    #[tokio::test]
    async fn test_summary_and_artifact() {
        let provider = Arc::new(MockLlmProvider::routing("risk_only", "Low risk, approved."));
        let renderer = Arc::new(MockReportRenderer::default());
        let aggregator = ResultAggregator::new()
            .with_summarizer(Arc::new(LlmSummarizer::new(provider.clone(), "m")))
            .with_renderer(renderer.clone());

        let result = aggregator.aggregate(&risk_only_state()).await;

        assert_eq!(result["summary"], "Low risk, approved.");
        assert_eq!(result["output_artifact"], "mock-reports/report.md");
        // The renderer sees the summary
        assert_eq!(renderer.rendered().await[0]["summary"], "Low risk, approved.");
        let prompt = &provider.requests().await[0].messages[0].content;
        assert!(prompt.starts_with("Summarize this mortgage processing workflow result:"));
        assert!(prompt.contains("\"routing_decision\": \"risk_only\""));
    }

    #[tokio::test]
    async fn test_failures_are_not_fatal() {
        let aggregator = ResultAggregator::new()
            .with_summarizer(Arc::new(LlmSummarizer::new(
                Arc::new(MockLlmProvider::failing()),
                "m",
            )))
            .with_renderer(Arc::new(MockReportRenderer::failing()));

        let result = aggregator.aggregate(&risk_only_state()).await;

        assert_eq!(result["summary"], SUMMARY_UNAVAILABLE);
        assert!(!result.contains_key("output_artifact"));
        assert_eq!(result["processing_summary"]["total_steps"], 2);
    }
}
