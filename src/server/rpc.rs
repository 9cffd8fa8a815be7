//! JSON-RPC dispatch for the router's own task endpoint

use crate::agent::PipelineEngine;
use crate::error::{RouterError, INVALID_PARAMS_CODE};
use crate::observability::metrics::metrics;
use crate::protocol::{
    JsonRpcErrorObject, JsonRpcResponse, SendMessageParams, TaskReply, JSONRPC_VERSION,
    METHOD_MESSAGE_SEND, METHOD_TASKS_CANCEL,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const PARSE_ERROR_CODE: i64 = -32700;
pub const INVALID_REQUEST_CODE: i64 = -32600;
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

#[derive(Debug, Deserialize)]
struct CancelParams {
    #[serde(default)]
    id: String,
}

/// Decode one request body and answer it
///
/// Never fails: protocol problems become JSON-RPC error objects.
pub async fn handle_rpc(engine: &PipelineEngine, body: &[u8]) -> JsonRpcResponse {
    let request: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Rejected unparseable request body");
            return JsonRpcResponse::failure(Value::Null, PARSE_ERROR_CODE, "Parse error");
        }
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let version = request.get("jsonrpc").and_then(Value::as_str);
    let method = match request.get("method").and_then(Value::as_str) {
        Some(method) if version == Some(JSONRPC_VERSION) => method,
        _ => return JsonRpcResponse::failure(id, INVALID_REQUEST_CODE, "Invalid Request"),
    };
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    match method {
        METHOD_MESSAGE_SEND => handle_send(engine, id, params).await,
        METHOD_TASKS_CANCEL => handle_cancel(engine, id, params),
        other => {
            debug!(method = other, "Unknown method");
            JsonRpcResponse::failure(id, METHOD_NOT_FOUND_CODE, "Method not found")
        }
    }
}

async fn handle_send(engine: &PipelineEngine, id: Value, params: Value) -> JsonRpcResponse {
    let started = Instant::now();
    metrics().request_received();

    let message = match serde_json::from_value::<SendMessageParams>(params) {
        Ok(params) => params.message,
        Err(e) => {
            metrics().request_failed(started.elapsed());
            return error_response(id, RouterError::invalid_input(e.to_string()));
        }
    };

    let text = message.text();
    if text.trim().is_empty() {
        metrics().request_failed(started.elapsed());
        return error_response(id, RouterError::invalid_input("message has no text"));
    }

    let context_id = message
        .context_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(context_id = %context_id, "Task received");

    let final_result = engine.process(&text).await;
    let rendered = serde_json::to_string_pretty(&final_result)
        .unwrap_or_else(|_| Value::Object(final_result).to_string());
    let reply = TaskReply::completed(context_id, rendered);

    metrics().request_completed(started.elapsed());
    match serde_json::to_value(&reply) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => error_response(id, RouterError::internal_error(e.to_string())),
    }
}

fn handle_cancel(engine: &PipelineEngine, id: Value, params: Value) -> JsonRpcResponse {
    let task_id = serde_json::from_value::<CancelParams>(params)
        .map(|p| p.id)
        .unwrap_or_default();

    match engine.cancel(&task_id) {
        Ok(()) => JsonRpcResponse::success(id, json!({"id": task_id})),
        Err(e) => error_response(id, e),
    }
}

fn error_response(id: Value, error: RouterError) -> JsonRpcResponse {
    let code = error.json_rpc_code();
    let message = match &error {
        RouterError::UnsupportedOperation { .. } => "UnsupportedOperationError",
        _ if code == INVALID_PARAMS_CODE => "Invalid params",
        _ => "Internal error",
    };
    warn!(code, error = %error, "Request rejected");

    JsonRpcResponse {
        error: Some(JsonRpcErrorObject {
            code,
            message: message.to_string(),
            data: Some(json!({"detail": error.sanitized_message()})),
        }),
        ..JsonRpcResponse::failure(id, code, message)
    }
}
