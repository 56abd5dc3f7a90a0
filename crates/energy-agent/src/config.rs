//! Agent configuration

use anyhow::{Context, Result};
use energy_lib::MetricConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "AGENT_CONFIG";

/// What the exporter writes for every pod
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Exposition row only
    Text,
    /// Feature vector only
    Features,
    #[default]
    Both,
}

impl OutputMode {
    pub fn includes_text(&self) -> bool {
        matches!(self, OutputMode::Text | OutputMode::Both)
    }

    pub fn includes_features(&self) -> bool {
        matches!(self, OutputMode::Features | OutputMode::Both)
    }
}

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Recorded readings to replay
    #[serde(default = "default_replay_path")]
    pub replay_path: PathBuf,

    /// Sampling interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub output: OutputMode,

    /// Metric lists shared by every pod record
    #[serde(default)]
    pub metrics: MetricConfig,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_replay_path() -> PathBuf {
    PathBuf::from("readings.json")
}

fn default_interval_ms() -> u64 {
    3000
}

impl AgentConfig {
    /// Load configuration from the file named by `AGENT_CONFIG` (if set)
    /// and `AGENT_*` environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load configuration from an optional file, then the environment.
    /// Environment variables override file values; nested keys use `__`
    /// (for example `AGENT_METRICS__ENABLE_CPU_FREQ=true`).
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("AGENT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read agent configuration")?;

        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid agent configuration")?;

        agent
            .metrics
            .validate()
            .context("Invalid metric configuration")?;

        Ok(agent)
    }
}
