use crate::config::{ModelConfig, Settings};
use crate::prompt::Block;
use crate::providers::{instruction_text, user_text, ProviderFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    api_key: String,
    api_url: Option<String>,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            api_url: settings.api_base_url.clone(),
        }
    }
}

fn parts(texts: Vec<&str>) -> Vec<Part<'_>> {
    texts.into_iter().map(|text| Part { text }).collect()
}

impl ProviderFormat for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn endpoint(&self, config: &ModelConfig) -> String {
        self.api_url.clone().unwrap_or_else(|| {
            format!(
                "{}/{}/models/{}:generateContent",
                DEFAULT_API_BASE, config.api_version, config.model
            )
        })
    }

    fn headers(&self, _config: &ModelConfig) -> Vec<(&'static str, String)> {
        vec![("x-goog-api-key", self.api_key.clone())]
    }

    fn format_request_body(&self, config: &ModelConfig, messages: &[Block]) -> Value {
        let system = instruction_text(messages);
        let request = GeminiRequest {
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: parts(system),
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: parts(user_text(messages)),
            }],
            generation_config: GenerationConfig {
                max_output_tokens: config.max_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
            },
        };
        serde_json::to_value(request).unwrap_or(Value::Null)
    }

    fn parse_response(&self, raw: Value) -> Result<String, String> {
        let response: GeminiResponse = serde_json::from_value(raw).map_err(|e| e.to_string())?;
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| "response has no candidates".to_string())?;

        match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => {
                tracing::warn!("response hit the max_tokens limit and may be truncated")
            }
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST")) => {
                return Err(format!("candidate blocked: {}", reason))
            }
            _ => {}
        }

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err("candidate has no text parts".to_string());
        }
        Ok(text)
    }
}
