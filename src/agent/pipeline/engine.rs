//! Pipeline interpreter
//!
//! Drives one request from route decision to aggregation. Work stages pick a
//! registered worker from the snapshot taken when the request started, or run
//! locally when none matches. Stage failures are recorded in the slot and the
//! machine moves on.

use super::aggregation::ResultAggregator;
use super::state::{next_state, PipelineState, Stage};
use crate::agent::client::WorkerClient;
use crate::agent::discovery::{CapabilityRegistry, RegistrySnapshot};
use crate::agent::response::WorkerResult;
use crate::agent::route_decision::RouteLabel;
use crate::error::{RouterError, RouterResult};
use crate::observability::metrics::{metrics, StageTarget};
use crate::routing::Classifier;
use crate::workers::{LocalFallbackExecutor, StageInput};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Finite-state pipeline over the registry, the worker client and the local workers
pub struct PipelineEngine {
    registry: Arc<CapabilityRegistry>,
    client: WorkerClient,
    local: LocalFallbackExecutor,
    classifier: Classifier,
    aggregator: ResultAggregator,
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("registry", &self.registry)
            .field("classifier", &self.classifier)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl PipelineEngine {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        client: WorkerClient,
        local: LocalFallbackExecutor,
        classifier: Classifier,
        aggregator: ResultAggregator,
    ) -> Self {
        Self {
            registry,
            client,
            local,
            classifier,
            aggregator,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Classify `task_text` and run it through the pipeline
    pub async fn process(&self, task_text: &str) -> Map<String, Value> {
        self.run(task_text, None).await.final_result
    }

    /// Run with a caller-chosen route, skipping classification
    pub async fn process_with_route(&self, task_text: &str, route: RouteLabel) -> Map<String, Value> {
        self.run(task_text, Some(route)).await.final_result
    }

    /// Run the state machine to `Done` and return the full state
    pub async fn run(&self, task_text: &str, route: Option<RouteLabel>) -> PipelineState {
        let snapshot = self.registry.snapshot();
        let request_id = Uuid::new_v4();
        let span = crate::request_span!(%request_id, registered_agents = snapshot.len());

        async {
            let route = match route {
                Some(route) => route,
                None => self.classifier.decide(task_text).await,
            };
            metrics().route_selected(route.as_str());
            info!(route = %route, "Processing request");

            let mut state = PipelineState::new(task_text, route);
            state.log(format!("Routing decision: {route}"));

            let mut stage = next_state(Stage::RouteDecision, route);
            while stage != Stage::Done {
                if stage == Stage::Aggregation {
                    state.final_result = self.aggregator.aggregate(&state).await;
                    state.log("Final aggregation completed");
                } else {
                    self.execute_stage(stage, &mut state, &snapshot).await;
                }
                stage = next_state(stage, route);
            }

            info!(
                total_steps = state.total_steps(),
                successful_steps = state.successful_steps(),
                "Request complete"
            );
            state
        }
        .instrument(span)
        .await
    }

    /// Cancelling an active task is not supported
    pub fn cancel(&self, task_id: &str) -> RouterResult<()> {
        warn!(task_id = %task_id, "Rejected cancellation request");
        Err(RouterError::unsupported_operation("cancel"))
    }

    async fn execute_stage(
        &self,
        stage: Stage,
        state: &mut PipelineState,
        snapshot: &RegistrySnapshot,
    ) {
        let input = state.stage_input();
        let descriptor = snapshot.find(stage.keywords());
        let started = Instant::now();
        let agent = descriptor.map(|d| d.name.as_str()).unwrap_or("local");
        let input_kind = if input.is_data() { "data" } else { "text" };
        let span = crate::stage_span!(stage = stage.as_str(), agent, input = input_kind);

        let (slot, target) = async {
            match descriptor {
                Some(descriptor) => {
                    let text = remote_request_text(stage, &input, &state.task_text);
                    let session_id = Uuid::new_v4().to_string();
                    let slot = match self.client.send(descriptor, &text, &session_id).await {
                        WorkerResult::Failed { error } => error_slot(stage, &error),
                        other => other.into_slot(),
                    };
                    (slot, StageTarget::Remote)
                }
                None => {
                    debug!("No registered agent, running locally");
                    (
                        self.run_local(stage, &input, &state.task_text).await,
                        StageTarget::Local,
                    )
                }
            }
        }
        .instrument(span)
        .await;

        let failed = slot.contains_key("error");
        metrics().stage_executed(stage.as_str(), target, started.elapsed(), failed);
        if failed {
            warn!(stage = %stage, error = ?slot.get("error"), "Stage failed, continuing");
        }
        state.record(stage, slot, target == StageTarget::Local);
    }

    async fn run_local(
        &self,
        stage: Stage,
        input: &StageInput,
        task_text: &str,
    ) -> Map<String, Value> {
        match stage {
            Stage::DocumentProcessing => self.local.document_stage(task_text).await,
            Stage::RiskAssessment => self.local.risk_stage(input),
            Stage::ComplianceCheck => self.local.compliance_stage(input),
            _ => Map::new(),
        }
    }
}

/// Text sent to a remote worker for `stage`
pub fn remote_request_text(stage: Stage, input: &StageInput, task_text: &str) -> String {
    match (stage, input) {
        (Stage::DocumentProcessing, _) => format!(
            "Extract and analyze data from the mortgage application PDF. Query: {task_text}"
        ),
        (Stage::RiskAssessment, StageInput::Data(_)) => format!(
            "Perform credit risk assessment on this applicant data: {}",
            input.render()
        ),
        (Stage::RiskAssessment, StageInput::Text(_)) => {
            format!("Perform credit risk assessment. Query: {task_text}")
        }
        (Stage::ComplianceCheck, StageInput::Data(_)) => format!(
            "Perform regulatory compliance check on this mortgage application data: {}",
            input.render()
        ),
        (Stage::ComplianceCheck, StageInput::Text(_)) => {
            format!("Perform regulatory compliance check. Query: {task_text}")
        }
        _ => task_text.to_string(),
    }
}

fn error_slot(stage: Stage, reason: &str) -> Map<String, Value> {
    let mut slot = Map::new();
    slot.insert(
        "error".to_string(),
        json!(format!(
            "{} agent communication failed: {reason}",
            stage.agent_label()
        )),
    );
    slot
}
