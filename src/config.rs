// src/config.rs

//! Runtime configuration: loading, defaults, and the hot-reloadable
//! container the rest of the crate holds it behind.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Wraps a value in `Arc<Mutex<_>>`, for configuration that may be
/// hot-reloaded.
pub trait IntoMutex: Sized {
    fn into_mutex(self) -> Arc<Mutex<Self>>;
}

impl IntoMutex for Config {
    fn into_mutex(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }
}

/// This node's own identity and network endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    #[serde(default)]
    pub public_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            control_url: default_control_url(),
            public_url: String::new(),
            port: default_port(),
        }
    }
}

fn default_role() -> String {
    "proxy".to_string()
}
fn default_control_url() -> String {
    "http://127.0.0.1:51080".to_string()
}
fn default_port() -> u16 {
    51080
}

/// Timeouts governing every outbound RPC the controller issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// The bound on a single control-plane operation (prepare/commit
    /// calls, health probes).
    #[serde(default = "default_cplane_operation_ms")]
    pub cplane_operation_ms: u64,
    /// The bound used for keep-alive style probes and the final
    /// bump-metasync retry in force-join step 10.
    #[serde(default = "default_max_keepalive_ms")]
    pub max_keepalive_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            cplane_operation_ms: default_cplane_operation_ms(),
            max_keepalive_ms: default_max_keepalive_ms(),
        }
    }
}

fn default_cplane_operation_ms() -> u64 {
    2_000
}
fn default_max_keepalive_ms() -> u64 {
    5_000
}

/// Bounds on the metasync engine's retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetasyncConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Backlog threshold for the per-node delivery worker's ordered
    /// staging buffer; a slow/partitioned node is logged once its
    /// undelivered backlog exceeds this depth, without ever dropping or
    /// reordering a submission.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for MetasyncConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_queue_depth() -> usize {
    256
}

/// The number of proxies kept in the information-council.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InformationCouncilConfig {
    #[serde(default = "default_ic_size")]
    pub size: usize,
}

impl Default for InformationCouncilConfig {
    fn default() -> Self {
        Self {
            size: default_ic_size(),
        }
    }
}

fn default_ic_size() -> usize {
    3
}

/// The `/metrics` Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    51081
}

/// Top-level configuration, loaded from a TOML file via the `config` crate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub metasync: MetasyncConfig,
    #[serde(default)]
    pub information_council: InformationCouncilConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults
    /// for any field the file omits.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let cfg = Config::default();
        assert_eq!(cfg.node.role, "proxy");
        assert!(cfg.timeouts.cplane_operation_ms > 0);
        assert!(cfg.metasync.max_retries > 0);
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(Config::from_file("/no/such/path.toml").is_err());
    }
}
