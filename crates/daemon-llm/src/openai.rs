//! OpenAI-compatible chat completions provider (OpenRouter, LM Studio, LM proxy)

use crate::provider::{CognitionError, CognitionResult, CognitionService};
use crate::types::{CognitionRequest, CognitionResponse, Usage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const LMSTUDIO_BASE_URL: &str = "http://127.0.0.1:1234/v1";
pub const LMPROXY_BASE_URL: &str = "http://localhost:8080";

const OPENROUTER_REFERER: &str = "https://github.com/thamil33/deamon";
const OPENROUTER_TITLE: &str = "Daemon Framework";
const DEFAULT_TEMPERATURE: f32 = 0.7;

pub struct OpenAiCompatProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: Option<String>,
    extra_headers: Vec<(&'static str, String)>,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            extra_headers: Vec::new(),
        }
    }

    /// OpenRouter routes to many upstream providers behind one key.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        let mut provider = Self::new("openrouter", OPENROUTER_BASE_URL).with_api_key(api_key);
        provider
            .extra_headers
            .push(("HTTP-Referer", OPENROUTER_REFERER.to_string()));
        provider
            .extra_headers
            .push(("X-Title", OPENROUTER_TITLE.to_string()));
        provider
    }

    pub fn lmstudio(base_url: impl Into<String>) -> Self {
        Self::new("lmstudio", base_url)
    }

    pub fn lmproxy(base_url: impl Into<String>) -> Self {
        Self::new("lmproxy", base_url)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    /// Bound every request. A zero duration leaves requests unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.client = Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new());
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        };
        for (name, value) in &self.extra_headers {
            builder = builder.header(*name, value);
        }
        builder
    }
}

#[async_trait::async_trait]
impl CognitionService for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: CognitionRequest) -> CognitionResult<CognitionResponse> {
        let body = build_chat_request(&request);
        debug!("{} request: model={}", self.name, body.model);

        let response = self
            .authorize(self.client.post(format!("{}/chat/completions", self.base_url)))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("{} error {}: {}", self.name, status, text);
            return Err(CognitionError::from_status(status.as_u16(), text));
        }

        parse_chat_response(&text)
    }

    async fn validate_connection(&self) -> bool {
        let result = self
            .authorize(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await;
        match result {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                warn!("{} connection check failed: {}", self.name, e);
                false
            }
        }
    }
}

pub(crate) fn build_chat_request(request: &CognitionRequest) -> ChatRequest {
    ChatRequest {
        model: request.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: request.system.clone(),
            },
            ChatMessage {
                role: "user".into(),
                content: request.user.clone(),
            },
        ],
        temperature: request
            .temperature
            .unwrap_or(DEFAULT_TEMPERATURE)
            .clamp(0.0, 2.0),
        max_tokens: request.max_tokens,
        response_format: request
            .response_schema
            .as_ref()
            .map(|schema| schema.to_response_format()),
    }
}

/// Decode a chat completion body. A well-formed reply with no choices or a
/// null content is not an error here; it surfaces as `content: None`.
pub(crate) fn parse_chat_response(body: &str) -> CognitionResult<CognitionResponse> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CognitionError::InvalidResponse(format!("{}: {}", e, body)))?;

    let choice = parsed.choices.into_iter().next();
    let (content, finish_reason) = match choice {
        Some(c) => (c.message.and_then(|m| m.content), c.finish_reason),
        None => (None, None),
    };

    Ok(CognitionResponse {
        content,
        usage: parsed.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
        model: parsed.model,
        finish_reason,
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
