//! Remote worker calls
//!
//! Sends one `message/send` request per stage and turns whatever comes back
//! into a `WorkerResult`. Nothing escapes this boundary as an `Err`.

use crate::agent::response::{parse_worker_payload, WorkerResult};
use crate::protocol::{extract_reply_text, CapabilityDescriptor, JsonRpcResponse, TaskEnvelope};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default per-call timeout
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(120);

/// Transport-level failures talking to a worker
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("worker returned HTTP {0}")]
    Status(u16),
    #[error("reply body is not a JSON-RPC response: {0}")]
    InvalidBody(String),
    #[error("worker returned JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("reply has no text at result.status.message.parts[0].text")]
    MissingReplyText,
}

/// Client for delegating tasks to worker agents over a pooled connection
#[derive(Debug, Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl WorkerClient {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `text` to the agent described by `descriptor`
    pub async fn send(
        &self,
        descriptor: &CapabilityDescriptor,
        text: &str,
        session_id: &str,
    ) -> WorkerResult {
        match self.send_raw(descriptor, text, session_id).await {
            Ok(reply) => parse_worker_payload(&reply),
            Err(e) => {
                warn!(agent = %descriptor.name, url = %descriptor.url, error = %e, "Worker call failed");
                WorkerResult::failed(e.to_string())
            }
        }
    }

    /// Send and return the raw reply text
    pub async fn send_raw(
        &self,
        descriptor: &CapabilityDescriptor,
        text: &str,
        session_id: &str,
    ) -> Result<String, WorkerError> {
        let envelope = TaskEnvelope::new(session_id, text);
        debug!(
            agent = %descriptor.name,
            url = %descriptor.url,
            message_id = %envelope.message_id,
            session_id = %session_id,
            "Sending task to worker"
        );

        let response = self
            .http
            .post(&descriptor.url)
            .timeout(self.timeout)
            .json(&envelope.to_request())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WorkerError::Timeout(self.timeout)
                } else {
                    WorkerError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::Status(status.as_u16()));
        }

        let reply: JsonRpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                WorkerError::Timeout(self.timeout)
            } else {
                WorkerError::InvalidBody(e.to_string())
            }
        })?;

        if let Some(error) = reply.error {
            return Err(WorkerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        reply
            .result
            .as_ref()
            .and_then(extract_reply_text)
            .map(str::to_string)
            .ok_or(WorkerError::MissingReplyText)
    }
}
