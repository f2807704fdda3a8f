use serde::{Deserialize, Serialize};

/// Provider configuration for the agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Anthropic API key.
    #[serde(default)]
    pub anthropic_api_key: String,
    /// OpenAI API key.
    #[serde(default)]
    pub openai_api_key: String,
    /// Anthropic base URL override (tests point this at a mock server).
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
    /// OpenAI base URL override.
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            anthropic_base_url: default_anthropic_base_url(),
            openai_base_url: default_openai_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml_like_json() {
        let config: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.anthropic_base_url, "https://api.anthropic.com");
        assert_eq!(config.openai_base_url, "https://api.openai.com");
        assert_eq!(config.timeout_secs, 300);
    }
}
