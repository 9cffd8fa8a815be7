//! Capability discovery
//!
//! Probes a configured list of endpoints for their capability descriptors and
//! keeps the results as an immutable snapshot. Refreshing builds a new snapshot
//! and swaps it in; requests keep whichever snapshot they started with.

use crate::observability::metrics::metrics;
use crate::protocol::CapabilityDescriptor;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

/// Static keyword to canonical agent name table, checked before fuzzy matching
const KEYWORD_ROUTES: &[(&str, &str)] = &[
    ("document", "document_agent"),
    ("pdf", "document_agent"),
    ("extraction", "document_agent"),
    ("credit", "credit_risk_agent"),
    ("risk", "credit_risk_agent"),
    ("financial", "credit_risk_agent"),
    ("compliance", "compliance_agent"),
    ("regulatory", "compliance_agent"),
    ("legal", "compliance_agent"),
];

/// Why a single endpoint was excluded from the registry
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("descriptor request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("descriptor request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("descriptor request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("descriptor from {url} is malformed: {message}")]
    Malformed { url: String, message: String },
}

/// Immutable name -> descriptor view of the discovered agents
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    agents: BTreeMap<String, CapabilityDescriptor>,
    discovered_at: DateTime<Utc>,
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl RegistrySnapshot {
    pub fn empty() -> Self {
        Self {
            agents: BTreeMap::new(),
            discovered_at: Utc::now(),
        }
    }

    /// Build a snapshot; on duplicate names the first descriptor wins
    pub fn from_descriptors<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = CapabilityDescriptor>,
    {
        let mut agents = BTreeMap::new();
        for descriptor in descriptors {
            if agents.contains_key(&descriptor.name) {
                warn!(
                    agent = %descriptor.name,
                    url = %descriptor.url,
                    "Duplicate agent name in discovery results, keeping first"
                );
                continue;
            }
            agents.insert(descriptor.name.clone(), descriptor);
        }

        Self {
            agents,
            discovered_at: Utc::now(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.agents.get(name)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.agents.values()
    }

    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    /// Find the agent best matching the given keywords
    ///
    /// The canonical keyword table is consulted first, in keyword order. If it
    /// names no registered agent, descriptors are visited in name order and the
    /// first one whose name, description, skill names or tags contain any
    /// keyword wins.
    pub fn find(&self, keywords: &[&str]) -> Option<&CapabilityDescriptor> {
        for keyword in keywords {
            let keyword = keyword.to_lowercase();
            let canonical = KEYWORD_ROUTES
                .iter()
                .find(|(k, _)| *k == keyword)
                .and_then(|(_, name)| self.agents.get(*name));

            if let Some(descriptor) = canonical {
                debug!(keyword = %keyword, agent = %descriptor.name, "Matched canonical agent");
                return Some(descriptor);
            }
        }

        let descriptor = self
            .agents
            .values()
            .find(|d| keywords.iter().any(|keyword| d.matches_keyword(keyword)))?;
        debug!(agent = %descriptor.name, "Matched agent by capability text");
        Some(descriptor)
    }
}

/// Registry of worker agents discovered from a fixed endpoint list
#[derive(Debug)]
pub struct CapabilityRegistry {
    endpoints: Vec<String>,
    client: reqwest::Client,
    probe_timeout: Duration,
    card_path: String,
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl CapabilityRegistry {
    pub fn new(
        endpoints: Vec<String>,
        client: reqwest::Client,
        probe_timeout: Duration,
        card_path: impl Into<String>,
    ) -> Self {
        Self {
            endpoints,
            client,
            probe_timeout,
            card_path: card_path.into(),
            current: RwLock::new(Arc::new(RegistrySnapshot::empty())),
        }
    }

    /// Registry that never probes anything, serving a fixed snapshot
    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        let registry = Self::new(
            Vec::new(),
            reqwest::Client::new(),
            Duration::from_secs(30),
            "/.well-known/capability-card",
        );
        registry.swap(snapshot);
        registry
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Current snapshot; hold it for the lifetime of one request
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    /// Probe every endpoint concurrently and return the descriptors that answered
    ///
    /// Never fails: unreachable or malformed endpoints are logged and skipped.
    pub async fn discover(&self, endpoints: &[String]) -> RegistrySnapshot {
        let span = crate::discovery_span!(endpoint_count = endpoints.len());

        async {
            let probes = endpoints.iter().map(|endpoint| self.probe(endpoint));
            let outcomes = join_all(probes).await;

            let mut found = Vec::new();
            for (endpoint, outcome) in endpoints.iter().zip(outcomes) {
                match outcome {
                    Ok(descriptor) => {
                        info!(
                            endpoint = %endpoint,
                            agent = %descriptor.name,
                            skills = descriptor.skills.len(),
                            "Discovered agent"
                        );
                        found.push(descriptor);
                    }
                    Err(e) => warn!(endpoint = %endpoint, error = %e, "Skipping endpoint"),
                }
            }

            let snapshot = RegistrySnapshot::from_descriptors(found);
            metrics().record_discovery(endpoints.len(), snapshot.len());
            info!(
                discovered = snapshot.len(),
                attempted = endpoints.len(),
                agents = ?snapshot.names(),
                "Discovery complete"
            );
            snapshot
        }
        .instrument(span)
        .await
    }

    /// Re-run discovery over the configured endpoints and swap in the result
    pub async fn refresh(&self) -> Arc<RegistrySnapshot> {
        let snapshot = self.discover(&self.endpoints).await;
        self.swap(snapshot)
    }

    /// Replace the current snapshot, returning the new one
    pub fn swap(&self, snapshot: RegistrySnapshot) -> Arc<RegistrySnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::clone(&snapshot);
        snapshot
    }

    async fn probe(&self, endpoint: &str) -> Result<CapabilityDescriptor, DiscoveryError> {
        let base = endpoint.trim_end_matches('/');
        let url = format!("{base}{}", self.card_path);
        debug!(url = %url, "Probing capability descriptor");

        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::Timeout {
                        url: url.clone(),
                        timeout: self.probe_timeout,
                    }
                } else {
                    DiscoveryError::Request {
                        url: url.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let mut descriptor: CapabilityDescriptor =
            response.json().await.map_err(|e| DiscoveryError::Malformed {
                url: url.clone(),
                message: e.to_string(),
            })?;

        if descriptor.name.trim().is_empty() {
            descriptor.name = base.to_string();
        }
        if descriptor.url.trim().is_empty() {
            descriptor.url = base.to_string();
        }

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Skill;

    fn descriptor(name: &str) -> CapabilityDescriptor {
        CapabilityDescriptor::new(name, format!("http://localhost/{name}"))
    }

    #[test]
    fn test_canonical_keyword_lookup() {
        let snapshot = RegistrySnapshot::from_descriptors(vec![
            descriptor("document_agent"),
            descriptor("credit_risk_agent"),
            descriptor("compliance_agent"),
        ]);

        assert_eq!(
            snapshot.find(&["document", "pdf"]).unwrap().name,
            "document_agent"
        );
        assert_eq!(
            snapshot.find(&["Credit", "risk"]).unwrap().name,
            "credit_risk_agent"
        );
        assert_eq!(
            snapshot.find(&["regulatory"]).unwrap().name,
            "compliance_agent"
        );
    }

    #[test]
    fn test_canonical_name_beats_fuzzy_match() {
        let impostor = descriptor("risk_scanner").with_description("credit analysis");
        let snapshot =
            RegistrySnapshot::from_descriptors(vec![impostor, descriptor("credit_risk_agent")]);

        assert_eq!(
            snapshot.find(&["credit", "risk"]).unwrap().name,
            "credit_risk_agent"
        );
    }

    #[test]
    fn test_fuzzy_match_on_skills_and_tags() {
        let underwriter = descriptor("underwriter")
            .with_skill(Skill::new("u1", "Regulatory review", &["compliance"]));
        let snapshot = RegistrySnapshot::from_descriptors(vec![underwriter]);

        assert_eq!(
            snapshot.find(&["compliance", "regulatory"]).unwrap().name,
            "underwriter"
        );
        assert!(snapshot.find(&["pdf"]).is_none());
    }

    #[test]
    fn test_fuzzy_match_is_deterministic() {
        let snapshot = RegistrySnapshot::from_descriptors(vec![
            descriptor("zeta").with_description("risk"),
            descriptor("alpha").with_description("risk"),
        ]);
        assert_eq!(snapshot.find(&["risk"]).unwrap().name, "alpha");
    }

    #[test]
    fn test_fuzzy_match_prefers_name_order_over_keyword_order() {
        let snapshot = RegistrySnapshot::from_descriptors(vec![
            descriptor("zeta_checker").with_description("compliance desk"),
            descriptor("alpha_reviewer").with_description("legal review desk"),
        ]);

        assert_eq!(
            snapshot
                .find(&["compliance", "regulatory", "legal"])
                .unwrap()
                .name,
            "alpha_reviewer"
        );
    }

    #[test]
    fn test_empty_snapshot_finds_nothing() {
        let snapshot = RegistrySnapshot::empty();
        assert!(snapshot.is_empty());
        assert!(snapshot.find(&["document", "pdf", "extraction"]).is_none());
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let first = CapabilityDescriptor::new("document_agent", "http://first/");
        let second = CapabilityDescriptor::new("document_agent", "http://second/");
        let snapshot = RegistrySnapshot::from_descriptors(vec![first, second]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("document_agent").unwrap().url, "http://first/");
    }

    #[test]
    fn test_swap_leaves_held_snapshot_untouched() {
        let registry =
            CapabilityRegistry::with_snapshot(RegistrySnapshot::from_descriptors(vec![
                descriptor("document_agent"),
            ]));

        let held = registry.snapshot();
        registry.swap(RegistrySnapshot::empty());

        assert_eq!(held.len(), 1);
        assert!(registry.snapshot().is_empty());
    }

    proptest::proptest! {
        #[test]
        fn canonical_lookup_ignores_keyword_case(
            idx in 0usize..3,
            mask in proptest::collection::vec(proptest::bool::ANY, 12),
        ) {
            let (keyword, expected) = [
                ("extraction", "document_agent"),
                ("financial", "credit_risk_agent"),
                ("regulatory", "compliance_agent"),
            ][idx];
            let keyword: String = keyword
                .chars()
                .zip(mask.iter().cycle())
                .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
                .collect();
            let snapshot = RegistrySnapshot::from_descriptors(vec![
                descriptor("document_agent"),
                descriptor("credit_risk_agent"),
                descriptor("compliance_agent"),
            ]);

            let found = snapshot.find(&[keyword.as_str()]).map(|d| d.name.clone());
            proptest::prop_assert_eq!(found.as_deref(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_discover_with_no_endpoints() {
        let registry = CapabilityRegistry::new(
            Vec::new(),
            reqwest::Client::new(),
            Duration::from_secs(1),
            "/.well-known/capability-card",
        );
        let snapshot = registry.refresh().await;
        assert!(snapshot.is_empty());
    }
}
