//! Provider configuration.
//!
//! Configuration comes from explicit construction, the environment, or a
//! workspace settings file (`.xforge/settings.json`). API keys are always read
//! from the environment and are never logged.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Model used for OpenAI-style providers when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Model used for Anthropic when nothing else is configured.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which API dialect the endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Official OpenAI API
    OpenAI,
    /// Azure OpenAI deployment
    Azure,
    /// Anthropic messages API
    Anthropic,
    /// Any OpenAI-compatible base URL (Qwen, DeepSeek, OneAPI, local servers)
    Custom,
}

impl ProviderKind {
    /// Pick the dialect for an OpenAI-style key and an optional endpoint.
    pub fn for_endpoint(endpoint: Option<&str>) -> Self {
        match endpoint {
            Some(url) if url.to_lowercase().contains("azure") => Self::Azure,
            Some(_) => Self::Custom,
            None => Self::OpenAI,
        }
    }

    /// Model requested when the configuration names none.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            Self::OpenAI | Self::Azure | Self::Custom => DEFAULT_MODEL,
        }
    }
}

/// Everything an HTTP adapter needs to reach a provider.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "StoredConfig")]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    /// Base URL; required for Azure and Custom
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Serialized form; a missing model falls back to the provider's default.
#[derive(Deserialize)]
struct StoredConfig {
    provider: ProviderKind,
    #[serde(default)]
    endpoint: Option<String>,
    api_key: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

impl From<StoredConfig> for ProviderConfig {
    fn from(stored: StoredConfig) -> Self {
        Self {
            model: stored
                .model
                .unwrap_or_else(|| stored.provider.default_model().to_string()),
            provider: stored.provider,
            endpoint: stored.endpoint,
            api_key: stored.api_key,
            timeout_secs: stored.timeout_secs,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Shape of `.xforge/settings.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    default_provider: Option<ProviderKind>,
    default_model: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

impl ProviderConfig {
    /// Create a configuration with the provider's default model and timeout.
    pub fn new(provider: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            endpoint: None,
            api_key: api_key.into(),
            model: provider.default_model().to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build a configuration from environment variables.
    ///
    /// Checks in order:
    /// 1. XFORGE_LLM_API_KEY (dialect chosen from XFORGE_LLM_ENDPOINT)
    /// 2. OPENAI_API_KEY
    /// 3. ANTHROPIC_API_KEY
    ///
    /// XFORGE_LLM_MODEL overrides the model in every case.
    pub fn from_env() -> ProviderResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> ProviderResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let endpoint = non_empty("XFORGE_LLM_ENDPOINT");
        let model = non_empty("XFORGE_LLM_MODEL");

        let mut config = if let Some(key) = non_empty("XFORGE_LLM_API_KEY") {
            Self::new(ProviderKind::for_endpoint(endpoint.as_deref()), key)
        } else if let Some(key) = non_empty("OPENAI_API_KEY") {
            Self::new(ProviderKind::for_endpoint(endpoint.as_deref()), key)
        } else if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
            Self::new(ProviderKind::Anthropic, key)
        } else {
            return Err(ProviderError::NotConfigured);
        };

        config.endpoint = endpoint;
        if let Some(model) = model {
            config.model = model;
        }
        debug!("Provider configured from environment: {:?}", config);
        Ok(config)
    }

    /// Build a configuration from `<workspace_root>/.xforge/settings.json`.
    ///
    /// A missing settings file behaves like an empty one. The key comes from
    /// the environment variable matching the chosen provider.
    pub fn from_settings(workspace_root: &Path) -> ProviderResult<Self> {
        let settings_path = workspace_root.join(".xforge").join("settings.json");

        let settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path).map_err(|e| {
                ProviderError::InvalidConfig(format!("{}: {}", settings_path.display(), e))
            })?;
            serde_json::from_str::<SettingsFile>(&content).map_err(|e| {
                ProviderError::InvalidConfig(format!("{}: {}", settings_path.display(), e))
            })?
        } else {
            SettingsFile::default()
        };

        let provider = settings
            .default_provider
            .unwrap_or_else(|| ProviderKind::for_endpoint(settings.endpoint.as_deref()));

        let key_var = match provider {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Azure | ProviderKind::Custom => "XFORGE_LLM_API_KEY",
        };
        let api_key = std::env::var(key_var)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::NotConfigured)?;

        let mut config = Self::new(provider, api_key);
        config.endpoint = settings.endpoint;
        if let Some(model) = settings.default_model {
            config.model = model;
        }
        if let Some(secs) = settings.timeout_secs {
            config.timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that dialects needing an endpoint have one.
    pub fn validate(&self) -> ProviderResult<()> {
        match self.provider {
            ProviderKind::Azure | ProviderKind::Custom if self.endpoint.is_none() => {
                Err(ProviderError::InvalidConfig(format!(
                    "{:?} provider requires an endpoint",
                    self.provider
                )))
            }
            _ if self.api_key.is_empty() => Err(ProviderError::NotConfigured),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_no_keys_is_not_configured() {
        let err = ProviderConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured);

        let err = ProviderConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured);
    }

    #[test]
    fn test_provider_detection() {
        let config = ProviderConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "k")])).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAI);
        assert_eq!(config.model, DEFAULT_MODEL);

        let config = ProviderConfig::from_lookup(lookup(&[("ANTHROPIC_API_KEY", "k")])).unwrap();
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.model, DEFAULT_ANTHROPIC_MODEL);
        assert!(config.model.starts_with("claude"));

        let config = ProviderConfig::from_lookup(lookup(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("XFORGE_LLM_MODEL", "claude-opus-4-1"),
        ]))
        .unwrap();
        assert_eq!(config.model, "claude-opus-4-1");

        let config = ProviderConfig::from_lookup(lookup(&[
            ("XFORGE_LLM_API_KEY", "k"),
            ("XFORGE_LLM_ENDPOINT", "https://example.openai.azure.com"),
            ("XFORGE_LLM_MODEL", "gpt-4o"),
        ]))
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Azure);
        assert_eq!(config.model, "gpt-4o");

        let config = ProviderConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "k"),
            ("XFORGE_LLM_ENDPOINT", "https://dashscope.example.com/v1"),
        ]))
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Custom);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ProviderConfig::new(ProviderKind::OpenAI, "sk-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_custom_requires_endpoint() {
        let config = ProviderConfig::new(ProviderKind::Custom, "k");
        assert!(config.validate().is_err());
        assert!(config.with_endpoint("http://localhost:8080/v1").validate().is_ok());
    }

    #[test]
    fn test_stored_config_defaults_model_per_provider() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"provider": "anthropic", "api_key": "k"}"#).unwrap();
        assert_eq!(config.model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);

        let config: ProviderConfig =
            serde_json::from_str(r#"{"provider": "azure", "api_key": "k", "model": "gpt-4o"}"#).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(ProviderConfig::new(ProviderKind::Custom, "k").model, DEFAULT_MODEL);
    }
}
