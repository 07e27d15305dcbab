//! Provider factory: pick an adapter by name and configure it

use crate::anthropic::AnthropicProvider;
use crate::openai::{OpenAiCompatProvider, LMPROXY_BASE_URL, LMSTUDIO_BASE_URL};
use crate::provider::{CognitionError, CognitionResult, CognitionService};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    OpenRouter,
    LmStudio,
    LmProxy,
    Anthropic,
}

impl std::str::FromStr for ProviderKind {
    type Err = CognitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "lmstudio" | "lm_studio" => Ok(ProviderKind::LmStudio),
            "lmproxy" | "lm_proxy" => Ok(ProviderKind::LmProxy),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(CognitionError::UnknownProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenRouter => write!(f, "openrouter"),
            Self::LmStudio => write!(f, "lmstudio"),
            Self::LmProxy => write!(f, "lmproxy"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Credentials and endpoints for every supported provider.
#[derive(Clone, Debug, Default)]
pub struct ProviderSettings {
    pub openrouter_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub lmstudio_url: Option<String>,
    pub lmstudio_api_key: Option<String>,
    pub lmproxy_url: Option<String>,
    pub lmproxy_api_key: Option<String>,
    /// Per-request timeout; zero means unbounded.
    pub timeout: Duration,
}

/// Build a configured adapter. Hosted providers require their API key.
pub fn build_provider(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> CognitionResult<Arc<dyn CognitionService>> {
    let provider: Arc<dyn CognitionService> = match kind {
        ProviderKind::OpenRouter => {
            let key = required_key(&settings.openrouter_api_key, "OPENROUTER_API_KEY")?;
            Arc::new(OpenAiCompatProvider::openrouter(key).with_timeout(settings.timeout))
        }
        ProviderKind::Anthropic => {
            let key = required_key(&settings.anthropic_api_key, "ANTHROPIC_API_KEY")?;
            Arc::new(AnthropicProvider::new(key).with_timeout(settings.timeout))
        }
        ProviderKind::LmStudio => {
            let url = settings.lmstudio_url.as_deref().unwrap_or(LMSTUDIO_BASE_URL);
            Arc::new(
                OpenAiCompatProvider::lmstudio(url)
                    .with_api_key(settings.lmstudio_api_key.clone().unwrap_or_default())
                    .with_timeout(settings.timeout),
            )
        }
        ProviderKind::LmProxy => {
            let url = settings.lmproxy_url.as_deref().unwrap_or(LMPROXY_BASE_URL);
            Arc::new(
                OpenAiCompatProvider::lmproxy(url)
                    .with_api_key(settings.lmproxy_api_key.clone().unwrap_or_default())
                    .with_timeout(settings.timeout),
            )
        }
    };
    Ok(provider)
}

fn required_key(key: &Option<String>, env_name: &str) -> CognitionResult<String> {
    match key.as_deref().map(str::trim) {
        Some(k) if !k.is_empty() => Ok(k.to_string()),
        _ => Err(CognitionError::AuthFailed(format!("{} is not set", env_name))),
    }
}
