//! LLM configuration.
//!
//! Configuration is an explicit value object injected wherever it is needed,
//! never a process-wide singleton. Loading order: config file under the user
//! config dir, then environment variables.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-latest";

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// The supported LLM backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Claude,
    Gemini,
}

impl ProviderKind {
    /// Default model identifier for this backend.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
            Self::Claude => DEFAULT_CLAUDE_MODEL,
            Self::Gemini => DEFAULT_GEMINI_MODEL,
        }
    }
}

/// Generation configuration for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Creates a configuration with the backend's default model and
    /// generation parameters.
    pub fn for_provider(provider: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: provider.default_model().to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Whether a credential is present. An unconfigured client falls back to
    /// canned offline copy instead of making network calls.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Loads configuration from `<config dir>/attune/config.toml`, falling
    /// back to the `ATTUNE_PROVIDER` / `ATTUNE_API_KEY` environment variables.
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        let api_key = env::var("ATTUNE_API_KEY")
            .map_err(|_| CoreError::config("ATTUNE_API_KEY not found in config file or environment"))?;

        let provider = match env::var("ATTUNE_PROVIDER") {
            Ok(raw) => raw
                .parse::<ProviderKind>()
                .map_err(|_| CoreError::config(format!("Unknown provider '{raw}'")))?,
            Err(_) => ProviderKind::default(),
        };

        Ok(Self::for_provider(provider, api_key))
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&raw)?;

        let provider = file.provider.unwrap_or_default();
        let mut config = Self::for_provider(provider, file.api_key);
        if let Some(model) = file.model {
            config.model = model;
        }
        if let Some(temperature) = file.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = file.max_tokens {
            config.max_tokens = max_tokens;
        }
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("attune").join("config.toml"))
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    provider: Option<ProviderKind>,
    api_key: String,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}
