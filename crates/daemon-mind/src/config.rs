//! Daemon configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists, then overlaid with
//! the provider environment variables.

use daemon_llm::ProviderSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Identity.
    pub daemon: IdentityConfig,
    /// Provider and model selection.
    pub cognition: CognitionConfig,
    /// Durable memory file.
    pub memory: MemoryConfig,
    /// Self-rewrite cycle parameters.
    pub evolution: EvolutionConfig,
    /// Prompt threads.
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name shown at the prompt and woven into the system prompt.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitionConfig {
    /// Provider for conversation and classification: openrouter, lmstudio, lmproxy, anthropic.
    pub primary_provider: String,
    /// Model for conversation and classification.
    pub primary_model: String,
    /// Provider for code rewrites. Empty means same as primary.
    pub reasoning_provider: String,
    /// Model for code rewrites. Empty means same as primary.
    pub reasoning_model: String,
    pub openrouter_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub lmstudio_url: String,
    pub lmstudio_api_key: Option<String>,
    pub lmproxy_url: String,
    pub lmproxy_api_key: Option<String>,
    /// Per-request timeout in seconds. 0 waits forever: a hung provider then
    /// blocks the conversational loop indefinitely.
    pub timeout_secs: u64,
    /// Sampling temperature for conversation.
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Path of the durable memory file.
    pub path: PathBuf,
    /// Path of the searchable semantic memory file.
    pub semantic_path: PathBuf,
    /// Relevant semantic memories woven into each conversation prompt. 0 disables.
    pub context_memories: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// When false, every trigger is skipped without calling the provider.
    pub enabled: bool,
    /// Source file the rewrite cycle reads and replaces.
    pub source_path: PathBuf,
    /// Minimum seconds between periodic cycles.
    pub cooldown_secs: u64,
    /// Number of most recent memories summarised into a periodic goal.
    pub recent_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Directory of `*.json` prompt threads.
    pub patterns_dir: PathBuf,
}

// ============================================================
// Defaults
// ============================================================

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: "Daemon".into(),
        }
    }
}

impl Default for CognitionConfig {
    fn default() -> Self {
        Self {
            primary_provider: "openrouter".into(),
            primary_model: "openai/gpt-4o-mini".into(),
            reasoning_provider: String::new(),
            reasoning_model: String::new(),
            openrouter_api_key: None,
            anthropic_api_key: None,
            lmstudio_url: daemon_llm::openai::LMSTUDIO_BASE_URL.into(),
            lmstudio_api_key: None,
            lmproxy_url: daemon_llm::openai::LMPROXY_BASE_URL.into(),
            lmproxy_api_key: None,
            timeout_secs: 120,
            temperature: 0.7,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("akashic_record/log.json"),
            semantic_path: PathBuf::from("memory/daemon/index.json"),
            context_memories: 5,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_path: PathBuf::from("crates/daemon-mind/src/daemon.rs"),
            cooldown_secs: 300,
            recent_window: 10,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            patterns_dir: PathBuf::from("patterns"),
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl DaemonConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Overlay values from any variable source. Empty values are ignored.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let c = &mut self.cognition;

        if let Some(v) = get("PRIMARY_PROVIDER") {
            c.primary_provider = v;
        }
        if let Some(v) = get("PRIMARY_MODEL") {
            c.primary_model = v;
        }
        if let Some(v) = get("REASONING_PROVIDER") {
            c.reasoning_provider = v;
        }
        if let Some(v) = get("REASONING_MODEL") {
            c.reasoning_model = v;
        }
        if let Some(v) = get("OPENROUTER_API_KEY") {
            c.openrouter_api_key = Some(v);
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            c.anthropic_api_key = Some(v);
        }
        if let Some(v) = get("LM_STUDIO_URL") {
            c.lmstudio_url = v;
        }
        if let Some(v) = get("LM_STUDIO_API_KEY") {
            c.lmstudio_api_key = Some(v);
        }
        if let Some(v) = get("LMPROXY_BASE_URL") {
            c.lmproxy_url = v;
        }
        if let Some(v) = get("LMPROXY_API_KEY") {
            c.lmproxy_api_key = Some(v);
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Copy with every API key that is set replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        let c = &mut config.cognition;
        for key in [
            &mut c.openrouter_api_key,
            &mut c.anthropic_api_key,
            &mut c.lmstudio_api_key,
            &mut c.lmproxy_api_key,
        ] {
            if key.is_some() {
                *key = Some(REDACTED.into());
            }
        }
        config
    }
}

const REDACTED: &str = "<redacted>";

impl CognitionConfig {
    pub fn reasoning_provider(&self) -> &str {
        if self.reasoning_provider.is_empty() {
            &self.primary_provider
        } else {
            &self.reasoning_provider
        }
    }

    pub fn reasoning_model(&self) -> &str {
        if self.reasoning_model.is_empty() {
            &self.primary_model
        } else {
            &self.reasoning_model
        }
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            openrouter_api_key: self.openrouter_api_key.clone(),
            anthropic_api_key: self.anthropic_api_key.clone(),
            lmstudio_url: Some(self.lmstudio_url.clone()),
            lmstudio_api_key: self.lmstudio_api_key.clone(),
            lmproxy_url: Some(self.lmproxy_url.clone()),
            lmproxy_api_key: self.lmproxy_api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl EvolutionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = DaemonConfig::default();
        assert_eq!(config.daemon.name, "Daemon");
        assert_eq!(config.cognition.primary_provider, "openrouter");
        assert_eq!(config.memory.path, PathBuf::from("akashic_record/log.json"));
        assert_eq!(config.evolution.cooldown_secs, 300);
        assert!(config.evolution.enabled);
    }

    #[test]
    fn reasoning_falls_back_to_primary() {
        let mut c = CognitionConfig::default();
        assert_eq!(c.reasoning_provider(), "openrouter");
        assert_eq!(c.reasoning_model(), "openai/gpt-4o-mini");
        c.reasoning_model = "anthropic/claude-3-opus".into();
        assert_eq!(c.reasoning_model(), "anthropic/claude-3-opus");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [evolution]
            cooldown_secs = 60

            [cognition]
            primary_provider = "lmstudio"
            "#,
        )
        .unwrap();
        assert_eq!(config.evolution.cooldown_secs, 60);
        assert_eq!(config.evolution.recent_window, 10);
        assert_eq!(config.cognition.primary_provider, "lmstudio");
        assert_eq!(config.cognition.primary_model, "openai/gpt-4o-mini");
    }

    #[test]
    fn toml_dump_parses_back() {
        let dumped = DaemonConfig::default().to_toml();
        let parsed: DaemonConfig = toml::from_str(&dumped).unwrap();
        assert_eq!(parsed.memory.path, DaemonConfig::default().memory.path);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = DaemonConfig::load(Path::new("/nonexistent/daemon.toml"));
        assert_eq!(config.daemon.name, "Daemon");
    }

    #[test]
    fn env_overlay_ignores_empty_values() {
        let vars: HashMap<&str, &str> = [
            ("PRIMARY_PROVIDER", "lmproxy"),
            ("REASONING_MODEL", "deepseek/deepseek-r1"),
            ("OPENROUTER_API_KEY", ""),
            ("LMPROXY_BASE_URL", "http://proxy:9000"),
        ]
        .into_iter()
        .collect();
        let mut config = DaemonConfig::default();
        config.apply_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.cognition.primary_provider, "lmproxy");
        assert_eq!(config.cognition.reasoning_model(), "deepseek/deepseek-r1");
        assert!(config.cognition.openrouter_api_key.is_none());
        assert_eq!(config.cognition.lmproxy_url, "http://proxy:9000");
    }

    #[test]
    fn redacted_dump_hides_keys() {
        let mut config = DaemonConfig::default();
        config.cognition.openrouter_api_key = Some("sk-or-secret".into());
        config.cognition.lmproxy_api_key = Some("proxy-secret".into());

        let dumped = config.redacted().to_toml();
        assert!(!dumped.contains("sk-or-secret"));
        assert!(!dumped.contains("proxy-secret"));
        assert!(dumped.contains("openrouter_api_key = \"<redacted>\""));
        assert!(!dumped.contains("anthropic_api_key"));
        // The live config keeps its keys.
        assert_eq!(config.cognition.openrouter_api_key.as_deref(), Some("sk-or-secret"));
    }

    #[test]
    fn semantic_memory_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.memory.semantic_path, PathBuf::from("memory/daemon/index.json"));
        assert_eq!(config.memory.context_memories, 5);
    }

    #[test]
    fn provider_settings_carry_timeout() {
        let mut c = CognitionConfig::default();
        c.timeout_secs = 0;
        assert!(c.provider_settings().timeout.is_zero());
    }
}
