//! Daemon: the composition root
//!
//! Owns one of each component and drives a conversational turn:
//! listen, think, respond, remember, reflect. Each answered exchange is
//! also kept in semantic memory as a contemplation.

use crate::classifier::Classifier;
use crate::config::DaemonConfig;
use crate::evolution::{CycleOutcome, EvolutionEngine};
use crate::memory::{MemoryStore, StoredMemory};
use crate::prompt::PromptComposer;
use crate::semantic::{MemoryArea, SemanticMemory};
use crate::state::StateTracker;
use crate::threads::ThreadLibrary;
use daemon_core::{DaemonMode, Error, Result};
use daemon_llm::{build_provider, CognitionRequest, CognitionService, ProviderKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Reply used whenever the primary model yields nothing.
pub const TROUBLED_REPLY: &str = "I... am having trouble forming a thought right now.";

/// Everything one turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    /// `None` when the memory could not be persisted.
    pub stored: Option<StoredMemory>,
    /// Semantic memory id of the exchange; `None` when the model gave no
    /// reply, the exchange was a duplicate, or the write failed.
    pub contemplation: Option<String>,
    /// Periodic reflection result; `Skipped` when an urgent cycle already ran.
    pub reflection: CycleOutcome,
}

impl TurnOutcome {
    pub fn restart_required(&self) -> bool {
        self.stored.as_ref().is_some_and(StoredMemory::restart_required)
            || self.reflection.restart_required()
    }
}

pub struct Daemon {
    config: DaemonConfig,
    primary: Arc<dyn CognitionService>,
    reasoning: Arc<dyn CognitionService>,
    state: Arc<StateTracker>,
    store: Arc<MemoryStore>,
    semantic: Arc<SemanticMemory>,
    evolution: Arc<EvolutionEngine>,
    threads: Arc<ThreadLibrary>,
    composer: PromptComposer,
}

impl Daemon {
    /// Wire the components around the given cognition services.
    pub fn new(
        config: DaemonConfig,
        primary: Arc<dyn CognitionService>,
        reasoning: Arc<dyn CognitionService>,
    ) -> Self {
        let state = Arc::new(StateTracker::new());
        let evolution = Arc::new(EvolutionEngine::new(
            reasoning.clone(),
            config.cognition.reasoning_model(),
            &config.evolution,
            state.clone(),
        ));
        let classifier = Classifier::new(primary.clone(), config.cognition.primary_model.clone());
        let store = Arc::new(
            MemoryStore::load(config.memory.path.clone(), classifier).with_trigger(evolution.clone()),
        );
        let semantic = Arc::new(SemanticMemory::load(config.memory.semantic_path.clone()));
        let threads = Arc::new(ThreadLibrary::load(&config.prompt.patterns_dir));
        let composer = PromptComposer::new(store.clone(), threads.clone())
            .with_semantic(semantic.clone(), config.memory.context_memories);

        Self {
            config,
            primary,
            reasoning,
            state,
            store,
            semantic,
            evolution,
            threads,
            composer,
        }
    }

    /// Build the configured providers and wire everything.
    pub fn from_config(config: DaemonConfig) -> Result<Self> {
        let settings = config.cognition.provider_settings();
        let build = |name: &str| -> Result<Arc<dyn CognitionService>> {
            let kind: ProviderKind = name.parse().map_err(|e| Error::config(format!("{}", e)))?;
            build_provider(kind, &settings).map_err(|e| Error::cognition(kind.to_string(), e.to_string()))
        };
        let primary = build(&config.cognition.primary_provider)?;
        let reasoning = if config.cognition.reasoning_provider() == config.cognition.primary_provider {
            primary.clone()
        } else {
            build(config.cognition.reasoning_provider())?
        };
        info!(
            primary = %config.cognition.primary_provider,
            model = %config.cognition.primary_model,
            reasoning = %config.cognition.reasoning_provider(),
            reasoning_model = %config.cognition.reasoning_model(),
            "cognition services ready"
        );
        Ok(Self::new(config, primary, reasoning))
    }

    pub fn name(&self) -> &str {
        &self.config.daemon.name
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<StateTracker> {
        &self.state
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn semantic(&self) -> &Arc<SemanticMemory> {
        &self.semantic
    }

    pub fn evolution(&self) -> &Arc<EvolutionEngine> {
        &self.evolution
    }

    pub fn threads(&self) -> &Arc<ThreadLibrary> {
        &self.threads
    }

    pub fn composer(&self) -> &PromptComposer {
        &self.composer
    }

    /// Check both cognition services once. Failures are logged, not fatal:
    /// every later call still falls back on its own.
    pub async fn check_cognition(&self) -> bool {
        let primary_ok = self.primary.validate_connection().await;
        if !primary_ok {
            warn!(provider = self.primary.name(), "primary cognition service unreachable");
        }
        let reasoning_ok = if Arc::ptr_eq(&self.primary, &self.reasoning) {
            primary_ok
        } else {
            let ok = self.reasoning.validate_connection().await;
            if !ok {
                warn!(provider = self.reasoning.name(), "reasoning cognition service unreachable");
            }
            ok
        };
        primary_ok && reasoning_ok
    }

    /// Ask the primary model for a reply. Never fails.
    pub async fn converse(&self, user_input: &str, thread: Option<&str>) -> String {
        self.think(user_input, thread)
            .await
            .unwrap_or_else(|| TROUBLED_REPLY.to_string())
    }

    async fn think(&self, user_input: &str, thread: Option<&str>) -> Option<String> {
        let system = self.composer.build_conversation_prompt(thread, user_input).await;
        let request = CognitionRequest::new(system, user_input, self.config.cognition.primary_model.clone())
            .with_temperature(self.config.cognition.temperature);

        match self.primary.invoke(request).await {
            Ok(response) => {
                let reply = response.content.filter(|c| !c.trim().is_empty());
                if reply.is_none() {
                    warn!("primary model returned no content");
                }
                reply
            }
            Err(e) => {
                warn!(provider = self.primary.name(), error = %e, "conversation call failed");
                None
            }
        }
    }

    async fn remember_exchange(&self, user_input: &str, reply: &str, thread: Option<&str>) -> Option<String> {
        let metadata = BTreeMap::from([
            ("type".to_string(), "conversation".to_string()),
            ("thread".to_string(), thread.unwrap_or("none").to_string()),
        ]);
        let text = format!("User: {}\nDaemon: {}", user_input, reply);
        match self.semantic.store(&text, MemoryArea::Contemplations, metadata).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "exchange not kept in semantic memory");
                None
            }
        }
    }

    /// One full turn. Check [`TurnOutcome::restart_required`] afterwards.
    pub async fn handle_turn(&self, user_input: &str, thread: Option<&str>) -> TurnOutcome {
        self.state.set_mode(DaemonMode::Listening);
        self.state.set_mode(DaemonMode::Thinking);
        let thought = self.think(user_input, thread).await;
        self.state.set_mode(DaemonMode::Responding);

        let contemplation = match &thought {
            Some(reply) => self.remember_exchange(user_input, reply, thread).await,
            None => None,
        };
        let reply = thought.unwrap_or_else(|| TROUBLED_REPLY.to_string());

        let event = conversation_event(thread, user_input, &reply);
        let stored = match self.store.store_memory(&event).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                error!(error = %e, "turn not remembered");
                None
            }
        };

        if stored.as_ref().is_some_and(StoredMemory::restart_required) {
            return TurnOutcome {
                reply,
                stored,
                contemplation,
                reflection: CycleOutcome::Skipped,
            };
        }

        let reflection = self.reflect().await;
        if !reflection.restart_required() {
            self.state.set_mode(DaemonMode::Idle);
        }
        TurnOutcome {
            reply,
            stored,
            contemplation,
            reflection,
        }
    }

    /// Periodic self-reflection over recent memories, gated by the cooldown.
    pub async fn reflect(&self) -> CycleOutcome {
        if !self.evolution.periodic_due().await {
            return CycleOutcome::Skipped;
        }
        let recent = self.store.recent(self.config.evolution.recent_window).await;
        if recent.is_empty() {
            return CycleOutcome::Skipped;
        }
        self.state.set_mode(DaemonMode::SelfReflecting);
        self.evolution.periodic_cycle(&recent).await
    }
}

/// Memory text recorded for one exchange.
pub fn conversation_event(thread: Option<&str>, user_input: &str, reply: &str) -> String {
    let prefix = thread.map(|t| format!("[Thread: {}] ", t)).unwrap_or_default();
    format!(
        "{}The Architect said: '{}'. I responded: '{}'",
        prefix, user_input, reply
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_without_thread() {
        assert_eq!(
            conversation_event(None, "Hello", "Hi"),
            "The Architect said: 'Hello'. I responded: 'Hi'"
        );
    }

    #[test]
    fn event_with_thread() {
        assert_eq!(
            conversation_event(Some("oracle"), "Hello", "Hi"),
            "[Thread: oracle] The Architect said: 'Hello'. I responded: 'Hi'"
        );
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let mut config = DaemonConfig::default();
        config.cognition.primary_provider = "ollama".into();
        let err = Daemon::from_config(config).err().unwrap();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn missing_key_is_cognition_error() {
        let mut config = DaemonConfig::default();
        config.cognition.openrouter_api_key = None;
        let err = Daemon::from_config(config).err().unwrap();
        assert!(matches!(err, Error::Cognition { .. }));
    }
}
