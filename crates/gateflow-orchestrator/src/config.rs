use gateflow_agent::RuntimeConfig;
use gateflow_core::{GateflowError, GateflowResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level platform configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateflowConfig {
    /// Root directory for per-project state (`<root>/<project>/.truth`,
    /// `docs/`, `specs/`, `designs/`).
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    /// Default model for gate-agent executions.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Completion token ceiling for gate-agent executions.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Assessment session lifetime in minutes.
    #[serde(default = "default_assessment_expiry_minutes")]
    pub assessment_expiry_minutes: i64,
    /// Characters of user feedback kept in `document_revised` events.
    #[serde(default = "default_feedback_excerpt_chars")]
    pub feedback_excerpt_chars: usize,
    /// Provider configuration.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./projects")
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_assessment_expiry_minutes() -> i64 {
    30
}

fn default_feedback_excerpt_chars() -> usize {
    240
}

impl Default for GateflowConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            assessment_expiry_minutes: default_assessment_expiry_minutes(),
            feedback_excerpt_chars: default_feedback_excerpt_chars(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl GateflowConfig {
    /// Loads configuration from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> GateflowResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        toml::from_str(&raw)
            .map_err(|e| GateflowError::invalid(format!("config parse error: {e}")))
    }
}
