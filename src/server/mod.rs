//! HTTP surface of the router
//!
//! The router is itself an agent: it publishes a capability card at the
//! configured well-known path and accepts JSON-RPC tasks on `POST /`. Health,
//! metrics and a manual registry refresh sit alongside for operators.

pub mod rpc;

pub use rpc::handle_rpc;

use crate::agent::{CapabilityRegistry, PipelineEngine};
use crate::config::RouterConfig;
use crate::error::{RouterError, RouterResult};
use crate::observability::metrics::metrics;
use crate::protocol::{AgentCapabilities, CapabilityDescriptor, Skill};
use bytes::Bytes;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use warp::Filter;

const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Liveness report for `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub registered_agents: usize,
    pub agents: Vec<String>,
    pub discovered_at: String,
    pub uptime_seconds: u64,
}

/// Names registered after a manual refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
    pub agents: Vec<String>,
}

/// Capability card the router publishes about itself
pub fn router_card(config: &RouterConfig) -> CapabilityDescriptor {
    let mut card = CapabilityDescriptor::new(config.router.name.clone(), config.advertised_url())
        .with_description(config.router.description.clone())
        .with_skill(
            Skill::new(
                "routing_agent_skill",
                "Mortgage workflow routing",
                &["routing", "orchestration", "workflow", "mortgage"],
            )
            .with_description(
                "Classifies mortgage requests and coordinates document, credit risk \
                 and compliance agents",
            ),
        );
    card.input_modes = vec!["text".to_string(), "text/plain".to_string()];
    card.output_modes = vec!["text".to_string(), "application/json".to_string()];
    card.capabilities = AgentCapabilities {
        streaming: true,
        push_notifications: true,
    };
    card
}

/// Router HTTP service
pub struct RouterServer {
    engine: Arc<PipelineEngine>,
    card: CapabilityDescriptor,
    card_path: String,
    started: Instant,
}

impl RouterServer {
    pub fn new(engine: Arc<PipelineEngine>, card: CapabilityDescriptor, card_path: &str) -> Self {
        Self {
            engine,
            card,
            card_path: card_path.to_string(),
            started: Instant::now(),
        }
    }

    pub fn card(&self) -> &CapabilityDescriptor {
        &self.card
    }

    fn health_status(&self) -> HealthStatus {
        let snapshot = self.engine.registry().snapshot();
        HealthStatus {
            status: "healthy".to_string(),
            service: self.card.name.clone(),
            registered_agents: snapshot.len(),
            agents: snapshot.names(),
            discovered_at: snapshot.discovered_at().to_rfc3339(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }

    /// All routes, ready for `warp::serve` or `warp::test`
    pub fn routes(
        self: Arc<Self>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let card_server = self.clone();
        let rpc_server = self.clone();
        let health_server = self.clone();
        let refresh_server = self.clone();

        // GET <card_path> - capability card
        let card_route = warp::get()
            .and(warp::path::full())
            .and_then(move |path: warp::path::FullPath| {
                let server = card_server.clone();
                async move {
                    let requested = path.as_str().trim_end_matches('/');
                    if requested == server.card_path.trim_end_matches('/') {
                        Ok(warp::reply::json(&server.card))
                    } else {
                        Err(warp::reject::not_found())
                    }
                }
            });

        // POST / - JSON-RPC tasks
        let rpc_route = warp::path::end()
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::bytes())
            .and_then(move |body: Bytes| {
                let server = rpc_server.clone();
                async move {
                    let response = handle_rpc(&server.engine, &body).await;
                    Ok::<_, Infallible>(warp::reply::json(&response))
                }
            });

        // GET /health - liveness plus registry size
        let health_route = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let server = health_server.clone();
                async move { Ok::<_, Infallible>(warp::reply::json(&server.health_status())) }
            });

        // GET /metrics - counters and latencies
        let metrics_route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(|| async move {
                Ok::<_, Infallible>(warp::reply::json(&metrics().get_metrics()))
            });

        // POST /registry/refresh - rediscover workers now
        let refresh_route = warp::path!("registry" / "refresh")
            .and(warp::post())
            .and_then(move || {
                let server = refresh_server.clone();
                async move {
                    let snapshot = server.engine.registry().refresh().await;
                    Ok::<_, Infallible>(warp::reply::json(&RefreshResponse {
                        count: snapshot.len(),
                        agents: snapshot.names(),
                    }))
                }
            });

        health_route
            .or(metrics_route)
            .or(refresh_route)
            .or(rpc_route)
            .or(card_route)
    }

    /// Serve until ctrl-c
    pub async fn run(self: Arc<Self>, addr: SocketAddr) -> RouterResult<()> {
        let routes = self.clone().routes();
        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
            })
            .map_err(|e| RouterError::transport_error(format!("failed to bind {addr}: {e}")))?;

        info!(address = %bound, card_path = %self.card_path, "Router listening");
        server.await;
        info!("Router stopped");
        Ok(())
    }
}

/// Re-run discovery every `interval`, swapping in each new snapshot
pub fn spawn_refresh(registry: Arc<CapabilityRegistry>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; startup discovery already ran
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = registry.refresh().await;
            info!(registered_agents = snapshot.len(), "Periodic discovery complete");
        }
    })
}
