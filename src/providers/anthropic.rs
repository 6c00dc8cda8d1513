use crate::config::{ModelConfig, Settings};
use crate::prompt::Block;
use crate::providers::{instruction_text, user_text, ProviderFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

pub struct AnthropicProvider {
    api_key: String,
    api_url: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<TextBlock<'a>>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<TextBlock<'a>>,
}

#[derive(Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: &'a str,
}

impl<'a> TextBlock<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            block_type: "text",
            text,
        }
    }
}

#[derive(Deserialize, Debug)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            api_url: settings
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }
}

impl ProviderFormat for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn endpoint(&self, _config: &ModelConfig) -> String {
        self.api_url.clone()
    }

    fn headers(&self, config: &ModelConfig) -> Vec<(&'static str, String)> {
        vec![
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", config.api_version.clone()),
        ]
    }

    fn format_request_body(&self, config: &ModelConfig, messages: &[Block]) -> Value {
        // Instructions become system blocks; files and the final directive
        // are the content blocks of a single user turn.
        let request = AnthropicRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            system: instruction_text(messages)
                .into_iter()
                .map(TextBlock::new)
                .collect(),
            messages: vec![Message {
                role: "user",
                content: user_text(messages).into_iter().map(TextBlock::new).collect(),
            }],
        };
        serde_json::to_value(request).unwrap_or(Value::Null)
    }

    fn parse_response(&self, raw: Value) -> Result<String, String> {
        let response: AnthropicResponse = serde_json::from_value(raw).map_err(|e| e.to_string())?;

        if response.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!("response hit the max_tokens limit and may be truncated");
        }

        let texts: Vec<String> = response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect();

        if texts.is_empty() {
            return Err("no text content block in response".to_string());
        }
        Ok(texts.concat())
    }
}
