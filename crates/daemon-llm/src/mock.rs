//! MockCognition: deterministic cognition replies for testing
//!
//! Implements CognitionService, returning scripted replies and recording
//! every request so tests can assert on what was asked and in what order.

use crate::provider::{CognitionError, CognitionResult, CognitionService};
use crate::types::{CognitionRequest, CognitionResponse};
use tokio::sync::Mutex;

/// Mock behavior configuration
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Reply with this content
    Content(String),
    /// Reply successfully but with no content field
    NoContent,
    /// Fail the call as a transport error
    Error(String),
}

/// A sequence of behaviors; each invoke pops the next one.
/// When the sequence is exhausted, the default behavior is used.
pub struct MockCognition {
    behaviors: Mutex<Vec<MockBehavior>>,
    default_behavior: MockBehavior,
    requests: Mutex<Vec<CognitionRequest>>,
}

impl MockCognition {
    /// Create a mock that always returns the same behavior
    pub fn constant(behavior: MockBehavior) -> Self {
        Self {
            behaviors: Mutex::new(Vec::new()),
            default_behavior: behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with a sequence of behaviors (consumed in order)
    pub fn sequence(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors),
            default_behavior: MockBehavior::NoContent,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a constant JSON content reply
    pub fn json(value: serde_json::Value) -> Self {
        Self::constant(MockBehavior::Content(value.to_string()))
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Every request received, oldest first
    pub async fn requests(&self) -> Vec<CognitionRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_behavior(&self) -> MockBehavior {
        let mut behaviors = self.behaviors.lock().await;
        if behaviors.is_empty() {
            self.default_behavior.clone()
        } else {
            behaviors.remove(0)
        }
    }
}

#[async_trait::async_trait]
impl CognitionService for MockCognition {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: CognitionRequest) -> CognitionResult<CognitionResponse> {
        self.requests.lock().await.push(request);
        match self.next_behavior().await {
            MockBehavior::Content(text) => Ok(CognitionResponse::text(text)),
            MockBehavior::NoContent => Ok(CognitionResponse::empty()),
            MockBehavior::Error(msg) => Err(CognitionError::Unavailable(msg)),
        }
    }
}
