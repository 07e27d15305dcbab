//! Error types for the Daemon

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cognition error: {provider} - {message}")]
    Cognition { provider: String, message: String },

    #[error("memory error: {0}")]
    Memory(String),

    #[error("evolution error: {0}")]
    Evolution(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn cognition(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cognition {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}
