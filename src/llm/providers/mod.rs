//! LLM provider implementations
//!
//! Concrete `LlmProvider` backends and a factory that picks one from the
//! `[llm]` configuration section.

pub mod anthropic;
pub mod openai;

pub use anthropic::*;
pub use openai::*;

use crate::config::LlmSection;
use crate::llm::provider::{LlmError, LlmProvider};
use std::sync::Arc;
use std::time::Duration;

/// Build the provider named by `section.provider`
pub fn create_provider(
    section: &LlmSection,
    api_key: String,
    timeout: Duration,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match section.provider.to_lowercase().as_str() {
        "openai" => {
            let mut config = OpenAiConfig {
                api_key,
                timeout,
                ..Default::default()
            };
            if let Some(base_url) = &section.base_url {
                config.base_url = base_url.trim_end_matches('/').to_string();
            }
            Ok(Arc::new(OpenAiProvider::new(config)?))
        }
        "anthropic" => {
            let mut config = AnthropicConfig {
                api_key,
                timeout,
                probe_model: section.model.clone(),
                ..Default::default()
            };
            if let Some(base_url) = &section.base_url {
                config.base_url = base_url.trim_end_matches('/').to_string();
            }
            Ok(Arc::new(AnthropicProvider::new(config)?))
        }
        other => Err(LlmError::NotConfigured(format!(
            "Unknown LLM provider '{other}' (expected 'openai' or 'anthropic')"
        ))),
    }
}
