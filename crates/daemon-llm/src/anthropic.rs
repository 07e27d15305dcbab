//! Anthropic Messages API provider with SSE streaming, accumulated into one reply

use crate::provider::{CognitionError, CognitionResult, CognitionService};
use crate::types::{CognitionRequest, CognitionResponse, ResponseSchema};
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Streamed piece of a Messages API reply.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum StreamDelta {
    Text(String),
    Done { stop_reason: Option<String> },
}

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
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
}

#[async_trait::async_trait]
impl CognitionService for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn invoke(&self, request: CognitionRequest) -> CognitionResult<CognitionResponse> {
        let system = match &request.response_schema {
            Some(schema) => format!("{}\n\n{}", request.system, schema_directive(schema)),
            None => request.system.clone(),
        };

        let body = AnthropicRequest {
            model: request.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user".into(),
                content: request.user.clone(),
            }],
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            stream: true,
            system: Some(system),
            temperature: request.temperature.map(|t| t.clamp(0.0, 1.0)),
        };

        debug!("Anthropic request: model={}", body.model);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic error {}: {}", status, error_text);
            return Err(CognitionError::from_status(status.as_u16(), error_text));
        }

        let stream = parse_sse_stream(response.bytes_stream());
        tokio::pin!(stream);

        let mut text = String::new();
        let mut stop_reason = None;
        while let Some(delta) = stream.next().await {
            match delta? {
                StreamDelta::Text(t) => text.push_str(&t),
                StreamDelta::Done { stop_reason: r } => {
                    stop_reason = r;
                    break;
                }
            }
        }

        Ok(CognitionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            usage: None,
            model: Some(request.model),
            finish_reason: stop_reason,
        })
    }
}

/// Messages API has no response_format; the schema rides in the system prompt.
fn schema_directive(schema: &ResponseSchema) -> String {
    format!(
        "Respond with a single raw JSON object named `{}` that conforms to this JSON schema, \
         with no code fences and no commentary:\n{}",
        schema.name,
        serde_json::to_string(&schema.schema).unwrap_or_default()
    )
}

pub(crate) fn parse_sse_stream(
    bytes_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = CognitionResult<StreamDelta>> + Send {
    async_stream::stream! {
        // Raw bytes: a multi-byte character may straddle two chunks.
        let mut buffer: Vec<u8> = Vec::new();
        let mut stop_reason: Option<String> = None;

        tokio::pin!(bytes_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(CognitionError::StreamError(e.to_string()));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);

            while let Some(event_end) = find_event_end(&buffer) {
                let event_bytes: Vec<u8> = buffer.drain(..event_end + 2).collect();
                let event_str = String::from_utf8_lossy(&event_bytes[..event_end]);

                match parse_sse_event(&event_str) {
                    Some(SseEvent::Text(text)) => yield Ok(StreamDelta::Text(text)),
                    Some(SseEvent::StopReason(reason)) => {
                        debug!("Message complete: stop_reason={}", reason);
                        stop_reason = Some(reason);
                    }
                    Some(SseEvent::Stop) => {
                        yield Ok(StreamDelta::Done { stop_reason: stop_reason.take() });
                    }
                    Some(SseEvent::Error(message)) => {
                        yield Err(CognitionError::StreamError(message));
                    }
                    None => {}
                }
            }
        }
    }
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Text(String),
    StopReason(String),
    Stop,
    Error(String),
}

fn parse_sse_event(event_str: &str) -> Option<SseEvent> {
    let mut event_type = "";
    let mut event_data = "";

    for line in event_str.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            event_type = rest;
        } else if let Some(rest) = line.strip_prefix("data: ") {
            event_data = rest;
        }
    }

    if event_data.is_empty() {
        return None;
    }

    match event_type {
        "content_block_delta" => {
            let data = serde_json::from_str::<ContentBlockDelta>(event_data).ok()?;
            match data.delta {
                DeltaType::TextDelta { text } => Some(SseEvent::Text(text)),
                DeltaType::Other => None,
            }
        }
        "message_delta" => {
            let data = serde_json::from_str::<MessageDelta>(event_data).ok()?;
            data.delta.stop_reason.map(SseEvent::StopReason)
        }
        "message_stop" => Some(SseEvent::Stop),
        "error" => {
            let data = serde_json::from_str::<ErrorEvent>(event_data).ok()?;
            Some(SseEvent::Error(data.error.message))
        }
        _ => None,
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
