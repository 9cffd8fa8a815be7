//! JSON-RPC message types for agent task delegation
//!
//! Tasks are sent with the `message/send` method. A worker answers with a task
//! object whose status message carries the reply text in its first part.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_MESSAGE_SEND: &str = "message/send";
pub const METHOD_TASKS_CANCEL: &str = "tasks/cancel";

/// One unit of work sent to one worker
///
/// # Examples
/// ```
/// use mortgage_router::protocol::TaskEnvelope;
///
/// let envelope = TaskEnvelope::new("session-1", "Perform credit risk assessment");
/// let request = envelope.to_request();
/// assert_eq!(request.method, "message/send");
/// assert_eq!(request.params.message.parts[0].text, "Perform credit risk assessment");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEnvelope {
    /// UUID v4, never reused
    pub message_id: Uuid,
    /// Caller-supplied correlation id
    pub session_id: String,
    pub text: String,
}

impl TaskEnvelope {
    pub fn new<S: Into<String>, T: Into<String>>(session_id: S, text: T) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            session_id: session_id.into(),
            text: text.into(),
        }
    }

    /// Build the JSON-RPC request carrying this envelope
    pub fn to_request(&self) -> JsonRpcRequest<SendMessageParams> {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Value::String(Uuid::new_v4().to_string()),
            method: METHOD_MESSAGE_SEND.to_string(),
            params: SendMessageParams {
                message: Message {
                    role: Role::User,
                    message_id: self.message_id.to_string(),
                    context_id: Some(self.session_id.clone()),
                    parts: vec![Part::text(&self.text)],
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    pub params: P,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendMessageParams {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub parts: Vec<Part>,
}

impl Message {
    /// Concatenated text of every text part
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(default = "default_part_kind")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

fn default_part_kind() -> String {
    "text".to_string()
}

impl Part {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            kind: default_part_kind(),
            text: text.into(),
        }
    }
}

/// Completed task returned by the router's own `message/send` handler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskReply {
    pub id: String,
    pub context_id: String,
    pub kind: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    pub state: String,
    pub message: Message,
    pub timestamp: String,
}

impl TaskReply {
    pub fn completed<S: Into<String>>(context_id: S, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context_id: context_id.into(),
            kind: "task".to_string(),
            status: TaskStatus {
                state: "completed".to_string(),
                message: Message {
                    role: Role::Agent,
                    message_id: Uuid::new_v4().to_string(),
                    context_id: None,
                    parts: vec![Part::text(text)],
                },
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC response; exactly one of `result` or `error` is set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure<S: Into<String>>(id: Value, code: i64, message: S) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Reply text at `result.status.message.parts[0].text`
pub fn extract_reply_text(result: &Value) -> Option<&str> {
    result
        .get("status")?
        .get("message")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}
