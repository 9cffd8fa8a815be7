//! Router configuration
//!
//! TOML-backed configuration for the routing service: the service identity,
//! the candidate worker endpoints probed during discovery, worker call timeouts,
//! the text-generation provider used for classification and summaries, and
//! report output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main router configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterConfig {
    pub router: RouterSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub worker: WorkerSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub report: ReportSection,
}

/// Router identity and listen address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterSection {
    /// Router name (must match [a-zA-Z0-9._-]+)
    #[serde(default = "default_router_name")]
    pub name: String,
    /// Human-readable description published in the capability card
    #[serde(default = "default_router_description")]
    pub description: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable URL advertised in the capability card
    pub public_url: Option<String>,
}

/// Worker discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySection {
    /// Ordered candidate endpoint base URLs
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Per-probe timeout in seconds (default: 30)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Descriptor path appended to each endpoint
    #[serde(default = "default_card_path")]
    pub card_path: String,
    /// Re-run discovery on this interval when set
    pub refresh_interval_secs: Option<u64>,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            probe_timeout_secs: default_probe_timeout(),
            card_path: default_card_path(),
            refresh_interval_secs: None,
        }
    }
}

/// Remote worker call settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerSection {
    /// Per-call timeout in seconds (default: 120)
    #[serde(default = "default_worker_timeout")]
    pub timeout_secs: u64,
    /// Base directory for document references resolved by the local document stage
    pub documents_dir: Option<String>,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_worker_timeout(),
            documents_dir: None,
        }
    }
}

/// LLM section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// Optional base URL override for the provider API
    pub base_url: Option<String>,
    /// Sampling temperature (default: 0.0)
    #[serde(default)]
    pub temperature: f32,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: default_output_dir(),
        }
    }
}

fn default_router_name() -> String {
    "routing_agent".to_string()
}

fn default_router_description() -> String {
    "Routes mortgage application requests to document, credit risk and compliance agents"
        .to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    10004
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_card_path() -> String {
    "/.well-known/capability-card".to_string()
}

fn default_worker_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> String {
    "reports".to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid router name: {0}")]
    InvalidRouterName(String),
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RouterConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field formats and value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_router_name(&self.router.name)?;

        for endpoint in &self.discovery.endpoints {
            validate_endpoint(endpoint)?;
        }

        if self.discovery.probe_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "discovery.probe_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.worker.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "worker.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.discovery.refresh_interval_secs == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "discovery.refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if !self.discovery.card_path.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "discovery.card_path '{}' must start with '/'",
                self.discovery.card_path
            )));
        }

        Ok(())
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.llm.api_key_env.clone()))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery.probe_timeout_secs)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.timeout_secs)
    }

    /// URL advertised in the router's own capability card
    pub fn advertised_url(&self) -> String {
        self.router
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/", self.router.host, self.router.port))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[router]
name = "test-router"

[discovery]
endpoints = ["http://localhost:10001", "http://localhost:10002"]

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate router name format
fn validate_router_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidRouterName(format!(
            "Router name '{name}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

/// Endpoints must be absolute http(s) URLs
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[router]
name = "routing_agent"
description = "Mortgage router"
host = "0.0.0.0"
port = 9000
public_url = "http://router.internal:9000/"

[discovery]
endpoints = ["http://localhost:10001", "http://localhost:10002", "http://localhost:10003"]
probe_timeout_secs = 5
card_path = "/.well-known/agent.json"
refresh_interval_secs = 300

[worker]
timeout_secs = 60

[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
api_key_env = "ANTHROPIC_API_KEY"
temperature = 0.2
max_tokens = 1000

[report]
enabled = false
output_dir = "out"
"#;

        let config = RouterConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.router.name, "routing_agent");
        assert_eq!(config.router.port, 9000);
        assert_eq!(config.discovery.endpoints.len(), 3);
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.discovery.card_path, "/.well-known/agent.json");
        assert_eq!(config.discovery.refresh_interval_secs, Some(300));
        assert_eq!(config.worker_timeout(), Duration::from_secs(60));
        assert_eq!(config.llm.temperature, 0.2);
        assert!(!config.report.enabled);
        assert_eq!(config.advertised_url(), "http://router.internal:9000/");
    }

    #[test]
    fn test_minimal_config_defaults() {
        let toml_content = r#"
[router]

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#;

        let config = RouterConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.router.name, "routing_agent");
        assert_eq!(config.router.port, 10004);
        assert!(config.discovery.endpoints.is_empty());
        assert_eq!(config.discovery.probe_timeout_secs, 30);
        assert_eq!(config.discovery.card_path, "/.well-known/capability-card");
        assert_eq!(config.worker.timeout_secs, 120);
        assert_eq!(config.llm.temperature, 0.0);
        assert!(config.report.enabled);
        assert_eq!(config.report.output_dir, "reports");
        assert_eq!(config.advertised_url(), "http://127.0.0.1:10004/");
    }

    #[test]
    fn test_invalid_router_name() {
        assert!(validate_router_name("bad name!").is_err());
        assert!(validate_router_name("").is_err());
        assert!(validate_router_name("routing_agent-1.0").is_ok());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut config = RouterConfig::test_config();
        config.discovery.endpoints.push("not a url".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        let mut config = RouterConfig::test_config();
        config.discovery.endpoints = vec!["ftp://localhost:21".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = RouterConfig::test_config();
        config.worker.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RouterConfig::test_config();
        config.discovery.probe_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RouterConfig::test_config();
        config.discovery.refresh_interval_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_card_path_must_be_absolute() {
        let mut config = RouterConfig::test_config();
        config.discovery.card_path = "well-known".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_api_key_env() {
        let mut config = RouterConfig::test_config();
        config.llm.api_key_env = "MORTGAGE_ROUTER_TEST_MISSING_KEY_VAR".to_string();
        assert!(matches!(
            config.get_llm_api_key(),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }

    #[test]
    fn test_missing_llm_section_fails() {
        let toml_content = r#"
[router]
name = "r"
"#;
        assert!(matches!(
            RouterConfig::from_toml_str(toml_content),
            Err(ConfigError::TomlParse(_))
        ));
    }
}
