pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod transport;

use crate::config::{FileConfig, ModelConfig, Overrides, Provider as ProviderType, Settings};
use crate::error::{Error, Result};
use crate::prompt::{self, Block};
use serde_json::Value;
use std::path::{Path, PathBuf};
use transport::{HttpRequest, HttpTransport, Transport};

/// Per-provider request and reply handling. Everything else about sending a
/// message lives in [`ChatClient`].
pub trait ProviderFormat: Send + Sync {
    fn name(&self) -> &'static str;

    fn endpoint(&self, config: &ModelConfig) -> String;

    fn headers(&self, config: &ModelConfig) -> Vec<(&'static str, String)>;

    fn format_request_body(&self, config: &ModelConfig, messages: &[Block]) -> Value;

    /// Pull the generated text out of the provider's reply envelope.
    /// The error is a human-readable cause.
    fn parse_response(&self, raw: Value) -> std::result::Result<String, String>;
}

pub struct ChatClient {
    config: ModelConfig,
    provider: Box<dyn ProviderFormat>,
    transport: Box<dyn Transport>,
    root: PathBuf,
}

impl ChatClient {
    pub fn new(
        config: ModelConfig,
        provider: Box<dyn ProviderFormat>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            config,
            provider,
            transport,
            root: PathBuf::from("."),
        }
    }

    /// Resolve prompt files against `root` instead of the working directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Send instructions, prompt files and a final directive as one request
    /// and return the generated text.
    pub async fn send_message<S: AsRef<str>>(
        &self,
        instructions: &[S],
        prompt_files: &[PathBuf],
        final_prompt: &str,
    ) -> Result<String> {
        let messages = prompt::build_messages(&self.root, instructions, prompt_files, final_prompt)?;
        let request = HttpRequest {
            url: self.provider.endpoint(&self.config),
            headers: self.provider.headers(&self.config),
            body: self.provider.format_request_body(&self.config, &messages),
        };

        tracing::debug!(
            provider = self.provider.name(),
            model = %self.config.model,
            blocks = messages.len(),
            "sending request"
        );
        let raw = self.transport.post(&request).await.map_err(|e| match e {
            Error::ResponseFormat { cause, .. } => {
                tracing::error!("Failed to decode {} response: {}", self.provider.name(), cause);
                Error::ResponseFormat {
                    provider: self.provider.name(),
                    cause,
                }
            }
            other => other,
        })?;

        self.provider.parse_response(raw).map_err(|cause| {
            tracing::error!("Failed to parse {} response: {}", self.provider.name(), cause);
            Error::ResponseFormat {
                provider: self.provider.name(),
                cause,
            }
        })
    }
}

/// Build a client for already-resolved settings.
pub fn create_client(settings: Settings, transport: Box<dyn Transport>) -> ChatClient {
    let provider: Box<dyn ProviderFormat> = match settings.model.provider {
        ProviderType::Anthropic => Box::new(anthropic::AnthropicProvider::new(&settings)),
        ProviderType::OpenAI => Box::new(openai::OpenAIProvider::new(&settings)),
        ProviderType::Gemini => Box::new(gemini::GeminiProvider::new(&settings)),
    };
    ChatClient::new(settings.model, provider, transport)
}

/// Resolve a client from the process environment and the user config file.
pub fn get_client(explicit: Option<ModelConfig>, overrides: &Overrides) -> Result<ChatClient> {
    get_client_from(explicit, overrides, &FileConfig::load(), |key| {
        std::env::var(key).ok()
    })
}

/// Resolve a client: an explicit model config wins, then CLI overrides,
/// `env` and the config file, then the built-in default preset. Fails when
/// no provider or API key can be resolved.
pub fn get_client_from<F>(
    explicit: Option<ModelConfig>,
    overrides: &Overrides,
    file_config: &FileConfig,
    env: F,
) -> Result<ChatClient>
where
    F: Fn(&str) -> Option<String>,
{
    let settings = match explicit {
        Some(model) => {
            let overrides = Overrides {
                provider: Some(model.provider.name().to_string()),
                model: Some(model.model.clone()),
            };
            Settings {
                model,
                ..Settings::resolve(&overrides, file_config, env)?
            }
        }
        None => Settings::resolve(overrides, file_config, env)?,
    };
    tracing::info!(
        "using {} model {}",
        settings.model.provider.name(),
        settings.model.model
    );
    Ok(create_client(settings, Box::new(HttpTransport::new())))
}

fn instruction_text(messages: &[Block]) -> Vec<&str> {
    messages
        .iter()
        .filter(|b| b.role == prompt::Role::Instruction)
        .map(|b| b.text.as_str())
        .collect()
}

fn user_text(messages: &[Block]) -> Vec<&str> {
    messages
        .iter()
        .filter(|b| b.role == prompt::Role::User)
        .map(|b| b.text.as_str())
        .collect()
}
