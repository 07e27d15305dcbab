//! Daemon LLM - Cognition service boundary and provider adapters

pub mod anthropic;
pub mod factory;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use factory::{build_provider, ProviderKind, ProviderSettings};
pub use mock::{MockBehavior, MockCognition};
pub use openai::OpenAiCompatProvider;
pub use provider::{CognitionError, CognitionResult, CognitionService};
pub use types::*;
