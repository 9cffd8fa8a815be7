//! Routing core: capability discovery, worker delegation and the request pipeline

pub mod client;
pub mod discovery;
pub mod pipeline;
pub mod response;
pub mod route_decision;

pub use client::{WorkerClient, WorkerError};
pub use discovery::{CapabilityRegistry, DiscoveryError, RegistrySnapshot};
pub use pipeline::{next_state, PipelineEngine, PipelineState, ResultAggregator, Stage};
pub use response::{ResponseShape, WorkerResult};
pub use route_decision::RouteLabel;
