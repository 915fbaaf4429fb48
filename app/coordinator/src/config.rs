//! Coordinator configuration loaded from TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "coordinator.toml";
/// Default address agents connect to.
pub const DEFAULT_AGENT_ADDRESS: &str = "0.0.0.0:5001";
/// Default address of the HTTP API.
pub const DEFAULT_HTTP_ADDRESS: &str = "0.0.0.0:4000";
/// Default browser origin allowed by CORS.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:8080";

/// Top-level coordinator configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Listener addresses.
    #[serde(default)]
    pub server: ServerConfig,
    /// Cross-origin policy of the HTTP API.
    #[serde(default)]
    pub cors: CorsConfig,
    /// Action pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Listener addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address of the agent port.
    pub agent_address: String,
    /// Address of the HTTP API.
    pub http_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            agent_address: DEFAULT_AGENT_ADDRESS.to_owned(),
            http_address: DEFAULT_HTTP_ADDRESS.to_owned(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the API. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_owned()],
        }
    }
}

/// Action pipeline configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on waiting for an agent's response, in milliseconds.
    /// Unset waits indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_timeout_ms: Option<u64>,
}

impl PipelineConfig {
    /// The exchange timeout as a [`Duration`].
    pub fn exchange_timeout(&self) -> Option<Duration> {
        self.exchange_timeout_ms.map(Duration::from_millis)
    }
}

impl CoordinatorConfig {
    /// Parse a TOML string, expanding `${ENV}` references first.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let expanded = crate::utils::expand_env_vars(toml_str);
        let config: Self = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let config = Self::load(path)?;
            tracing::info!("loaded configuration from {}", path.display());
            Ok(config)
        } else {
            tracing::info!("no configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
