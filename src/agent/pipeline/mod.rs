//! Request pipeline: state machine, interpreter and result aggregation

pub mod aggregation;
pub mod engine;
pub mod state;

pub use aggregation::{LlmSummarizer, ResultAggregator, Summarizer};
pub use engine::PipelineEngine;
pub use state::{next_state, PipelineState, Stage};
