//! Text-generation collaborators
//!
//! Provider-agnostic interface used for route classification and result
//! summaries, with OpenAI and Anthropic backends.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
