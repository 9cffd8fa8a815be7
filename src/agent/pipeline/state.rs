//! Pipeline states, transitions and per-request state

use crate::agent::route_decision::RouteLabel;
use crate::workers::StageInput;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Position of a request in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RouteDecision,
    DocumentProcessing,
    RiskAssessment,
    ComplianceCheck,
    Aggregation,
    Done,
}

/// Edges that do not depend on the route label
const TRANSITIONS: &[(Stage, Stage)] = &[
    (Stage::DocumentProcessing, Stage::RiskAssessment),
    (Stage::RiskAssessment, Stage::ComplianceCheck),
    (Stage::ComplianceCheck, Stage::Aggregation),
    (Stage::Aggregation, Stage::Done),
    (Stage::Done, Stage::Done),
];

impl Stage {
    /// The three stages that call a worker
    pub const WORK_STAGES: [Stage; 3] = [
        Stage::DocumentProcessing,
        Stage::RiskAssessment,
        Stage::ComplianceCheck,
    ];

    /// First work stage for a route
    pub fn entry_for(route: RouteLabel) -> Stage {
        match route {
            RouteLabel::DocumentOnly | RouteLabel::FullPipeline => Stage::DocumentProcessing,
            RouteLabel::RiskOnly => Stage::RiskAssessment,
            RouteLabel::ComplianceOnly => Stage::ComplianceCheck,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RouteDecision => "route_decision",
            Stage::DocumentProcessing => "document_processing",
            Stage::RiskAssessment => "risk_assessment",
            Stage::ComplianceCheck => "compliance_check",
            Stage::Aggregation => "aggregation",
            Stage::Done => "done",
        }
    }

    /// Registry lookup keywords, in priority order
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Stage::DocumentProcessing => &["document", "pdf", "extraction"],
            Stage::RiskAssessment => &["credit", "risk", "financial"],
            Stage::ComplianceCheck => &["compliance", "regulatory", "legal"],
            _ => &[],
        }
    }

    /// Key of the `final_result` slot this stage writes
    pub fn slot_key(&self) -> Option<&'static str> {
        match self {
            Stage::DocumentProcessing => Some("document_data"),
            Stage::RiskAssessment => Some("risk_assessment"),
            Stage::ComplianceCheck => Some("compliance_result"),
            _ => None,
        }
    }

    /// Name used in log messages and error slots
    pub fn agent_label(&self) -> &'static str {
        match self {
            Stage::DocumentProcessing => "Document",
            Stage::RiskAssessment => "Credit risk",
            Stage::ComplianceCheck => "Compliance",
            Stage::RouteDecision => "Routing",
            Stage::Aggregation => "Aggregation",
            Stage::Done => "Done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successor of `stage`; only `RouteDecision` consults the route
pub fn next_state(stage: Stage, route: RouteLabel) -> Stage {
    if stage == Stage::RouteDecision {
        return Stage::entry_for(route);
    }
    TRANSITIONS
        .iter()
        .find(|(from, _)| *from == stage)
        .map(|(_, to)| *to)
        .unwrap_or(Stage::Done)
}

/// Mutable state of one request, owned by the task driving it
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub task_text: String,
    pub route: RouteLabel,
    pub document_data: Map<String, Value>,
    pub risk_assessment: Map<String, Value>,
    pub compliance_result: Map<String, Value>,
    pub final_result: Map<String, Value>,
    pub messages: Vec<String>,
    pub executed: Vec<Stage>,
    pub fallback: Vec<Stage>,
}

impl PipelineState {
    pub fn new(task_text: impl Into<String>, route: RouteLabel) -> Self {
        Self {
            task_text: task_text.into(),
            route,
            document_data: Map::new(),
            risk_assessment: Map::new(),
            compliance_result: Map::new(),
            final_result: Map::new(),
            messages: Vec::new(),
            executed: Vec::new(),
            fallback: Vec::new(),
        }
    }

    pub fn slot(&self, stage: Stage) -> Option<&Map<String, Value>> {
        match stage {
            Stage::DocumentProcessing => Some(&self.document_data),
            Stage::RiskAssessment => Some(&self.risk_assessment),
            Stage::ComplianceCheck => Some(&self.compliance_result),
            Stage::Aggregation | Stage::Done => Some(&self.final_result),
            Stage::RouteDecision => None,
        }
    }

    fn slot_mut(&mut self, stage: Stage) -> Option<&mut Map<String, Value>> {
        match stage {
            Stage::DocumentProcessing => Some(&mut self.document_data),
            Stage::RiskAssessment => Some(&mut self.risk_assessment),
            Stage::ComplianceCheck => Some(&mut self.compliance_result),
            _ => None,
        }
    }

    /// Store a work stage's result and note how it ran
    pub fn record(&mut self, stage: Stage, slot: Map<String, Value>, local: bool) {
        let failed = slot.contains_key("error");
        if let Some(target) = self.slot_mut(stage) {
            *target = slot;
        }
        self.executed.push(stage);
        if local {
            self.fallback.push(stage);
        }
        let outcome = if failed { "failed" } else { "completed" };
        self.log(format!("{} processing {outcome}", stage.agent_label()));
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Most recent executed slot, error results included; the task text when
    /// no earlier stage ran
    pub fn stage_input(&self) -> StageInput {
        self.executed
            .iter()
            .rev()
            .find_map(|stage| self.slot(*stage))
            .map(|slot| StageInput::Data(slot.clone()))
            .unwrap_or_else(|| StageInput::Text(self.task_text.clone()))
    }

    pub fn total_steps(&self) -> usize {
        self.executed.len()
    }

    pub fn successful_steps(&self) -> usize {
        self.executed
            .iter()
            .filter_map(|stage| self.slot(*stage))
            .filter(|slot| !slot.contains_key("error"))
            .count()
    }
}
