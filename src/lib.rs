//! Mortgage Router
//!
//! A multi-agent task router for mortgage application analysis.
//!
//! # Overview
//!
//! The router accepts a natural-language task, decides which of three worker
//! roles it needs, and drives it through a fixed pipeline:
//! - Capability discovery against a list of candidate agent endpoints
//! - LLM route classification into one of four route labels
//! - Staged delegation to document, credit risk and compliance workers over
//!   JSON-RPC, with in-process fallbacks when no worker is registered
//! - Aggregation into a single result with a summary and an optional report
//!
//! # Quick Start
//!
//! ```rust
//! use mortgage_router::agent::{next_state, RouteLabel, Stage};
//!
//! let route = RouteLabel::normalize("  Risk_Only.\n").unwrap();
//! assert_eq!(route, RouteLabel::RiskOnly);
//!
//! // Routes fall through every later stage to aggregation
//! let first = next_state(Stage::RouteDecision, route);
//! assert_eq!(first, Stage::RiskAssessment);
//! assert_eq!(next_state(first, route), Stage::ComplianceCheck);
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod observability;
pub mod protocol;
pub mod report;
pub mod routing;
pub mod server;
pub mod testing;
pub mod workers;

pub use agent::{CapabilityRegistry, PipelineEngine, RegistrySnapshot, RouteLabel, WorkerClient};
pub use config::*;
pub use error::{RouterError, RouterResult};
pub use protocol::*;
pub use server::RouterServer;
