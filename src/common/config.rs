//! Configuration for groupsaga components

use crate::common::types::NodeTarget;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides (e.g. `GROUPSAGA_SAGA__MAX_RETRIES=3`)
pub const ENV_PREFIX: &str = "GROUPSAGA";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ordered node list; defines forward and compensation order
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeTarget>,

    /// Coordinator settings
    #[serde(default)]
    pub saga: SagaConfig,

    /// Batch driver settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Node service settings
    #[serde(default)]
    pub node_service: NodeServiceConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nodes() -> Vec<NodeTarget> {
    default_node_names()
        .into_iter()
        .map(|name| NodeTarget::new(name, "http://127.0.0.1:8080"))
        .collect()
}

fn default_node_names() -> Vec<String> {
    vec!["node01".into(), "node02".into(), "node03".into()]
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaConfig {
    /// Retries of the compensation pass after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Fixed delay between compensation attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Delay between existence-check reads; 0 polls in a tight loop
    #[serde(default)]
    pub existence_poll_interval_ms: u64,

    /// Per-request transport timeout for node calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_max_retries() -> usize {
    10
}
fn default_retry_delay() -> u64 {
    100
}
fn default_request_timeout() -> u64 {
    5_000
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            existence_poll_interval_ms: 0,
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl SagaConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn existence_poll_interval(&self) -> Duration {
        Duration::from_millis(self.existence_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Batch driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Concurrent coordinator invocations
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Number of generated group ids (`0..count`)
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_workers() -> usize {
    10
}
fn default_count() -> usize {
    100
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            count: default_count(),
        }
    }
}

/// Node service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeServiceConfig {
    /// Bind address for HTTP
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Node tables hosted by this process
    #[serde(default = "default_node_names")]
    pub nodes: Vec<String>,

    /// Probability in [0, 1] that a /group request fails with 500 or 408
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
fn default_failure_rate() -> f64 {
    0.5
}

impl Default for NodeServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            nodes: default_node_names(),
            failure_rate: default_failure_rate(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            saga: SagaConfig::default(),
            batch: BatchConfig::default(),
            node_service: NodeServiceConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file plus `GROUPSAGA_*` environment overrides
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on anything the coordinator cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        validate_nodes(&self.nodes)?;

        if self.batch.workers == 0 {
            return Err(crate::Error::InvalidConfig(
                "batch.workers must be at least 1".into(),
            ));
        }

        let rate = self.node_service.failure_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(crate::Error::InvalidConfig(format!(
                "node_service.failure_rate must be within [0, 1], got {}",
                rate
            )));
        }

        Ok(())
    }

    /// Look up a configured node by name
    pub fn node(&self, name: &str) -> crate::Result<&NodeTarget> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| crate::Error::UnknownNode(name.to_string()))
    }
}

/// Node list must be non-empty, uniquely named, and addressable over HTTP
pub fn validate_nodes(nodes: &[NodeTarget]) -> crate::Result<()> {
    if nodes.is_empty() {
        return Err(crate::Error::InvalidConfig("no nodes configured".into()));
    }

    let mut seen = HashSet::new();
    for node in nodes {
        if node.name.is_empty() {
            return Err(crate::Error::InvalidConfig("node name cannot be empty".into()));
        }
        if !seen.insert(node.name.as_str()) {
            return Err(crate::Error::InvalidConfig(format!(
                "duplicate node name: {}",
                node.name
            )));
        }
        let url = reqwest::Url::parse(&node.address).map_err(|e| {
            crate::Error::InvalidConfig(format!("node {} address {}: {}", node.name, node.address, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(crate::Error::InvalidConfig(format!(
                "node {} address must be http(s): {}",
                node.name, node.address
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.nodes[0].name, "node01");
        assert_eq!(config.saga.max_retries, 10);
        assert_eq!(config.saga.retry_delay(), Duration::from_millis(100));
        assert_eq!(config.batch.workers, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_nodes() {
        assert!(validate_nodes(&[]).is_err());
        assert!(validate_nodes(&[
            NodeTarget::new("a", "http://127.0.0.1:1"),
            NodeTarget::new("a", "http://127.0.0.1:2"),
        ])
        .is_err());
        assert!(validate_nodes(&[NodeTarget::new("a", "not a url")]).is_err());
        assert!(validate_nodes(&[NodeTarget::new("a", "ftp://host")]).is_err());
    }

    #[test]
    fn test_unknown_node_lookup() {
        let config = Config::default();
        assert!(config.node("node02").is_ok());
        assert!(matches!(
            config.node("node09"),
            Err(crate::Error::UnknownNode(_))
        ));
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[[nodes]]
name = "east"
address = "http://10.0.0.1:8080"

[[nodes]]
name = "west"
address = "http://10.0.0.2:8080"

[saga]
max_retries = 3
retry_delay_ms = 20
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[1].name, "west");
        assert_eq!(config.saga.max_retries, 3);
        assert_eq!(config.saga.retry_delay(), Duration::from_millis(20));
        assert_eq!(config.batch.workers, 10);
    }
}
