//! Worker reply normalization
//!
//! Workers answer in one of a few payload shapes. Replies are classified into a
//! `ResponseShape`, then reduced to a `WorkerResult` that renders to the same
//! JSON-object slot whatever happened on the wire.

use serde_json::{json, Map, Value};

/// Note attached when a reply could not be parsed as JSON
pub const UNPARSED_NOTE: &str = "Response was not valid JSON; raw text preserved";

/// Payload keys that wrap a worker's analysis
const NAMED_RESULT_KEYS: [&str; 2] = ["risk_analysis", "compliance_analysis"];

/// Shape of a parsed worker payload
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `{"results": [first, ...]}`
    ResultsList(Vec<Value>),
    /// `{"risk_analysis": {...}}` or `{"compliance_analysis": {...}}`
    NamedField(String, Value),
    /// Anything else, used as-is
    Direct(Value),
}

impl ResponseShape {
    pub fn classify(payload: Value) -> Self {
        if let Some(Value::Array(results)) = payload.get("results") {
            if !results.is_empty() {
                return ResponseShape::ResultsList(results.clone());
            }
        }

        for key in NAMED_RESULT_KEYS {
            if let Some(value) = payload.get(key) {
                return ResponseShape::NamedField(key.to_string(), value.clone());
            }
        }

        ResponseShape::Direct(payload)
    }

    /// The value that becomes the stage slot
    pub fn into_slot_value(self) -> Value {
        match self {
            ResponseShape::ResultsList(mut results) => results.swap_remove(0),
            ResponseShape::NamedField(_, value) => value,
            ResponseShape::Direct(value) => value,
        }
    }
}

/// Normalized outcome of one stage
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResult {
    Parsed(Map<String, Value>),
    Failed { error: String },
    Unparsed {
        raw_response: String,
        processing_note: String,
    },
}

impl WorkerResult {
    pub fn failed<S: Into<String>>(error: S) -> Self {
        WorkerResult::Failed {
            error: error.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WorkerResult::Failed { .. })
    }

    /// Render into the uniform slot shape
    pub fn into_slot(self) -> Map<String, Value> {
        match self {
            WorkerResult::Parsed(map) => map,
            WorkerResult::Failed { error } => object(json!({ "error": error })),
            WorkerResult::Unparsed {
                raw_response,
                processing_note,
            } => object(json!({
                "raw_response": raw_response,
                "processing_note": processing_note,
            })),
        }
    }
}

/// Turn reply text into a `WorkerResult`
pub fn parse_worker_payload(text: &str) -> WorkerResult {
    let payload = match parse_json_lenient(text) {
        Some(payload) => payload,
        None => return unparsed(text),
    };

    match ResponseShape::classify(payload).into_slot_value() {
        Value::Object(map) => WorkerResult::Parsed(map),
        _ => unparsed(text),
    }
}

fn unparsed(text: &str) -> WorkerResult {
    WorkerResult::Unparsed {
        raw_response: text.to_string(),
        processing_note: UNPARSED_NOTE.to_string(),
    }
}

/// Parse text as JSON, or the first fenced code block inside it
pub fn parse_json_lenient(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }

    extract_json_from_markdown(text).and_then(|block| serde_json::from_str(&block).ok())
}

/// Extract JSON from markdown code blocks
fn extract_json_from_markdown(text: &str) -> Option<String> {
    // Look for ```json blocks
    if let Some(start) = text.find("```json") {
        let content = &text[start + 7..];
        if let Some(end) = content.find("```") {
            return Some(content[..end].trim().to_string());
        }
    }

    // Bare ``` blocks only count when they hold an object
    if let Some(start) = text.find("```") {
        let content = &text[start + 3..];
        if let Some(end) = content.find("```") {
            let candidate = content[..end].trim();
            if candidate.starts_with('{') && candidate.ends_with('}') {
                return Some(candidate.to_string());
            }
        }
    }

    None
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_list_takes_first_element() {
        let result =
            parse_worker_payload(r#"{"results": [{"applicant_name": "Jane"}, {"ignored": true}]}"#);
        let slot = result.into_slot();
        assert_eq!(slot["applicant_name"], "Jane");
        assert!(!slot.contains_key("ignored"));
    }

    #[test]
    fn test_named_fields_unwrap() {
        let risk = parse_worker_payload(r#"{"risk_analysis": {"risk_level": "low"}, "agent": "x"}"#);
        assert_eq!(risk.into_slot()["risk_level"], "low");

        let compliance =
            parse_worker_payload(r#"{"compliance_analysis": {"approved": true}, "input_query": "q"}"#);
        assert_eq!(compliance.into_slot()["approved"], true);
    }

    #[test]
    fn test_direct_object_used_as_is() {
        let result = parse_worker_payload(r#"{"approved": false, "confidence": 0.65}"#);
        assert!(matches!(result, WorkerResult::Parsed(_)));
        assert_eq!(result.into_slot()["confidence"], 0.65);
    }

    #[test]
    fn test_empty_results_list_is_direct() {
        let result = parse_worker_payload(r#"{"results": []}"#);
        let slot = result.into_slot();
        assert!(slot["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_non_json_reply_is_unparsed() {
        let result = parse_worker_payload("The applicant looks fine to me.");
        let slot = result.into_slot();
        assert_eq!(slot["raw_response"], "The applicant looks fine to me.");
        assert_eq!(slot["processing_note"], UNPARSED_NOTE);
        assert!(!slot.contains_key("error"));
    }

    #[test]
    fn test_non_object_payload_is_unparsed() {
        let slot = parse_worker_payload("[1, 2, 3]").into_slot();
        assert_eq!(slot["raw_response"], "[1, 2, 3]");

        let slot = parse_worker_payload(r#"{"results": ["just text"]}"#).into_slot();
        assert!(slot.contains_key("processing_note"));
    }

    #[test]
    fn test_fenced_json_reply() {
        let reply = "Here you go:\n```json\n{\"risk_analysis\": {\"risk_score\": 5}}\n```\n";
        let slot = parse_worker_payload(reply).into_slot();
        assert_eq!(slot["risk_score"], 5);
    }

    #[test]
    fn test_bare_fence_requires_object() {
        assert!(extract_json_from_markdown("```\n{\"a\": 1}\n```").is_some());
        assert!(extract_json_from_markdown("```\nnot json\n```").is_none());
    }

    #[test]
    fn test_failed_renders_error_key() {
        let result = WorkerResult::failed("Credit risk agent communication failed: timeout");
        assert!(result.is_failure());
        let slot = result.into_slot();
        assert_eq!(slot.len(), 1);
        assert!(slot["error"].as_str().unwrap().contains("timeout"));
    }

    #[test]
    fn test_classify_shapes() {
        assert!(matches!(
            ResponseShape::classify(json!({"results": [{}]})),
            ResponseShape::ResultsList(_)
        ));
        assert!(matches!(
            ResponseShape::classify(json!({"compliance_analysis": {}})),
            ResponseShape::NamedField(ref k, _) if k == "compliance_analysis"
        ));
        assert!(matches!(
            ResponseShape::classify(json!({"x": 1})),
            ResponseShape::Direct(_)
        ));
    }
}
