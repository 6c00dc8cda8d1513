use crate::config::{ModelConfig, Settings};
use crate::prompt::{Block, Role};
use crate::providers::ProviderFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_API_BASE: &str = "https://api.openai.com";

pub struct OpenAIProvider {
    api_key: String,
    api_url: Option<String>,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

impl OpenAIProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            api_url: settings.api_base_url.clone(),
        }
    }
}

impl ProviderFormat for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn endpoint(&self, config: &ModelConfig) -> String {
        self.api_url.clone().unwrap_or_else(|| {
            format!("{}/{}/chat/completions", DEFAULT_API_BASE, config.api_version)
        })
    }

    fn headers(&self, _config: &ModelConfig) -> Vec<(&'static str, String)> {
        vec![("Authorization", format!("Bearer {}", self.api_key))]
    }

    fn format_request_body(&self, config: &ModelConfig, messages: &[Block]) -> Value {
        let request = OpenAIRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            messages: messages
                .iter()
                .map(|block| Message {
                    role: match block.role {
                        Role::Instruction => "system",
                        Role::User => "user",
                    },
                    content: &block.text,
                })
                .collect(),
        };
        serde_json::to_value(request).unwrap_or(Value::Null)
    }

    fn parse_response(&self, raw: Value) -> Result<String, String> {
        let response: OpenAIResponse = serde_json::from_value(raw).map_err(|e| e.to_string())?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| "response has no choices".to_string())?;

        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!("response hit the max_tokens limit and may be truncated");
        }

        match (choice.message.content, choice.message.refusal) {
            (Some(content), _) => Ok(content),
            (None, Some(refusal)) => Err(format!("model refused: {}", refusal)),
            (None, None) => Err("choice has no message content".to_string()),
        }
    }
}
