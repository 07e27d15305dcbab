//! Cognition service trait

use crate::types::{CognitionRequest, CognitionResponse};

/// Result type for cognition operations
pub type CognitionResult<T> = Result<T, CognitionError>;

/// Cognition error types
#[derive(Debug, thiserror::Error)]
pub enum CognitionError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl CognitionError {
    /// Map a non-success HTTP status to an error, the same way for every adapter.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => CognitionError::AuthFailed(body),
            429 => CognitionError::RateLimited {
                retry_after_ms: 60_000,
            },
            500..=599 => CognitionError::Unavailable(format!("{}: {}", status, body)),
            _ => CognitionError::RequestFailed(format!("{}: {}", status, body)),
        }
    }
}

/// The external text/structured-generation provider.
///
/// Implementations must not assume low latency or schema-conformant output;
/// callers decode every response defensively.
#[async_trait::async_trait]
pub trait CognitionService: Send + Sync {
    fn name(&self) -> &str;

    /// Send one system + user instruction pair and return the reply.
    async fn invoke(&self, request: CognitionRequest) -> CognitionResult<CognitionResponse>;

    /// Cheap reachability check. Adapters without one report `true`.
    async fn validate_connection(&self) -> bool {
        true
    }
}
