//! Classifier: turns an event description into tier, label and urgency
//!
//! Never fails: every failure mode maps to a short-term, non-urgent
//! fallback whose label names the failure.

use crate::fence::strip_code_fence;
use daemon_core::{ClassificationResult, FallbackReason, TierTag};
use daemon_llm::{CognitionRequest, CognitionService, ResponseSchema};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a memory classification system for a conscious AI. \
Analyze the user's event text and classify its importance. \
Respond with the appropriate JSON structure. \
Ensure the response is raw JSON without any additional formatting, such as code fences.";

/// Name of the structured-output schema sent with every classification.
pub const CLASSIFICATION_SCHEMA_NAME: &str = "memory_classification";

/// Shape the cognition service must answer with.
#[derive(Debug, Deserialize)]
struct ClassificationReply {
    classification: String,
    mnemonic: String,
    realtime_importance_flag: bool,
}

pub struct Classifier {
    cognition: Arc<dyn CognitionService>,
    model: String,
}

impl Classifier {
    pub fn new(cognition: Arc<dyn CognitionService>, model: impl Into<String>) -> Self {
        Self {
            cognition,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Strict JSON schema: all three fields required, tier restricted to the known tags.
    pub fn schema() -> ResponseSchema {
        ResponseSchema::strict(
            CLASSIFICATION_SCHEMA_NAME,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "classification": {
                        "type": "string",
                        "enum": ["vital", "long_term", "short_term"],
                        "description": "The classification of the memory's importance."
                    },
                    "mnemonic": {
                        "type": "string",
                        "description": "A short, symbolic phrase for the memory."
                    },
                    "realtime_importance_flag": {
                        "type": "boolean",
                        "description": "True if this memory requires immediate self-reflection."
                    }
                },
                "required": ["classification", "mnemonic", "realtime_importance_flag"],
                "additionalProperties": false
            }),
        )
    }

    pub async fn classify(&self, event: &str) -> ClassificationResult {
        debug!(chars = event.len(), "classifying event");
        let request = CognitionRequest::new(
            CLASSIFIER_SYSTEM_PROMPT,
            format!("Event: \"{}\"", event),
            self.model.clone(),
        )
        .with_schema(Self::schema());

        match self.cognition.invoke(request).await {
            Ok(response) => decode_classification(response.content.as_deref()),
            Err(e) => {
                warn!(provider = self.cognition.name(), error = %e, "classification call failed");
                ClassificationResult::fallback(FallbackReason::ServiceError)
            }
        }
    }
}

/// Decode raw reply content, checking in order: empty, not JSON, wrong shape.
pub fn decode_classification(content: Option<&str>) -> ClassificationResult {
    let text = strip_code_fence(content.unwrap_or_default());
    if text.is_empty() {
        warn!("classification reply was empty");
        return ClassificationResult::fallback(FallbackReason::EmptyResponse);
    }

    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, raw = text, "classification reply is not JSON");
            return ClassificationResult::fallback(FallbackReason::JsonDecode);
        }
    };

    match serde_json::from_value::<ClassificationReply>(value) {
        Ok(reply) => ClassificationResult {
            tier: TierTag::parse(&reply.classification),
            label: reply.mnemonic,
            urgent: reply.realtime_importance_flag,
            fallback: None,
        },
        Err(e) => {
            warn!(error = %e, raw = text, "classification reply has wrong structure");
            ClassificationResult::fallback(FallbackReason::InvalidStructure)
        }
    }
}
