//! Cognition request/response types

use serde::{Deserialize, Serialize};

/// One call to the cognition service: a system instruction, a user
/// instruction, a model, and an optional structured-output schema.
#[derive(Clone, Debug)]
pub struct CognitionRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub response_schema: Option<ResponseSchema>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CognitionRequest {
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: model.into(),
            response_schema: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Named JSON schema constraining the reply content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    pub fn strict(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            strict: true,
            schema,
        }
    }

    /// OpenAI-style `response_format` value.
    pub fn to_response_format(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": self,
        })
    }
}

/// Reply from the cognition service. `content` is `None` when the provider
/// answered but carried no extractable text.
#[derive(Clone, Debug, Default)]
pub struct CognitionResponse {
    pub content: Option<String>,
    pub usage: Option<Usage>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

impl CognitionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Token usage
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
