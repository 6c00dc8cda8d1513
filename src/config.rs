use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Anthropic,
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" | "gpt" => Ok(Provider::OpenAI),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(Error::Config(format!(
                "Unknown provider '{}'. Use 'anthropic', 'openai', or 'gemini'.",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
        }
    }

    fn key_env(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    fn default_preset(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet",
            Provider::OpenAI => "gpt",
            Provider::Gemini => "gemini",
        }
    }
}

/// Immutable request parameters for one model. Owned by a single chat client.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub provider: Provider,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Nucleus sampling. Left out of the request when unset; recent Claude
    /// models reject it alongside `temperature`.
    pub top_p: Option<f64>,
    /// Protocol version: the `anthropic-version` header, or the API path
    /// segment for the other providers.
    pub api_version: String,
}

impl ModelConfig {
    fn new(provider: Provider, model: &str) -> Self {
        let (api_version, top_p) = match provider {
            Provider::Anthropic => ("2023-06-01", None),
            Provider::OpenAI => ("v1", Some(0.9)),
            Provider::Gemini => ("v1beta", Some(0.9)),
        };
        Self {
            provider,
            model: model.to_string(),
            max_tokens: 8192,
            temperature: 0.2,
            top_p,
            api_version: api_version.to_string(),
        }
    }

    /// Look up a named preset.
    pub fn preset(name: &str) -> Option<Self> {
        let config = match name {
            "claude-sonnet" => Self::new(Provider::Anthropic, "claude-sonnet-4-5"),
            "claude-opus" => Self::new(Provider::Anthropic, "claude-opus-4-1"),
            "claude-haiku" => Self::new(Provider::Anthropic, "claude-haiku-4-5"),
            "gpt" => Self::new(Provider::OpenAI, "gpt-4.1"),
            "gemini" => Self::new(Provider::Gemini, "gemini-2.5-flash"),
            _ => return None,
        };
        Some(config)
    }

    /// Resolve a preset name or raw model identifier for `provider`.
    /// `None` selects the provider's default preset.
    pub fn for_provider(provider: Provider, model: Option<&str>) -> Result<Self> {
        let name = model.unwrap_or(provider.default_preset());
        match Self::preset(name) {
            Some(config) if config.provider == provider => Ok(config),
            Some(config) => Err(Error::Config(format!(
                "Model preset '{}' belongs to provider '{}', not '{}'",
                name,
                config.provider.name(),
                provider.name()
            ))),
            None => Ok(Self::new(provider, name)),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(Provider::Anthropic, "claude-sonnet-4-5")
    }
}

/// Everything needed to build a chat client.
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: ModelConfig,
    pub api_key: String,
    pub api_base_url: Option<String>,
}

/// Command-line values that take precedence over env and file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

impl FileConfig {
    /// Read the user config file. A missing file is empty; an invalid one is
    /// logged and ignored.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring invalid config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn path() -> Option<PathBuf> {
        // Check XDG_CONFIG_HOME first, then fall back to ~/.config
        let config_dir = env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))?;

        Some(config_dir.join("sasori").join("config.toml"))
    }
}

impl Settings {
    /// Layer CLI overrides, then `env`, then the config file, then presets.
    pub fn resolve<F>(overrides: &Overrides, file_config: &FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_str = overrides
            .provider
            .clone()
            .or_else(|| env("SASORI_PROVIDER"))
            .or_else(|| file_config.provider.clone());
        let provider = match provider_str {
            Some(name) => Provider::parse(&name)?,
            None => Provider::default(),
        };

        let model_name = overrides
            .model
            .clone()
            .or_else(|| env("SASORI_MODEL"))
            .or_else(|| file_config.model.clone());
        let mut model = ModelConfig::for_provider(provider, model_name.as_deref())?;

        if let Some(max_tokens) = parse_env(&env, "SASORI_MAX_TOKENS")?.or(file_config.max_tokens)
        {
            model.max_tokens = max_tokens;
        }
        if let Some(temperature) =
            parse_env(&env, "SASORI_TEMPERATURE")?.or(file_config.temperature)
        {
            model.temperature = temperature;
        }
        if let Some(top_p) = parse_env(&env, "SASORI_TOP_P")?.or(file_config.top_p) {
            model.top_p = Some(top_p);
        }

        let api_key = Self::resolve_api_key(provider, file_config, &env)?;
        let api_base_url = env("SASORI_API_BASE_URL").or_else(|| file_config.api_base_url.clone());

        Ok(Settings {
            model,
            api_key,
            api_base_url,
        })
    }

    fn resolve_api_key<F>(provider: Provider, file_config: &FileConfig, env: &F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Priority: SASORI_API_KEY > config file > provider-specific env var
        if let Some(key) = env("SASORI_API_KEY") {
            return Ok(key);
        }

        if let Some(key) = &file_config.api_key {
            return Ok(key.clone());
        }

        if let Some(key) = env(provider.key_env()) {
            return Ok(key);
        }

        Err(Error::Config(format!(
            "No API key found. Set SASORI_API_KEY, add api_key to ~/.config/sasori/config.toml, or set {}",
            provider.key_env()
        )))
    }
}

fn parse_env<F, T>(env: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}
