//! EvolutionEngine: self-rewrite cycles
//!
//! A cycle asks the reasoning model for a full replacement of the Daemon's
//! source file, backs the current file up to `<source>.bak`, writes the
//! replacement, and reports [`CycleOutcome::RestartRequired`]. The engine
//! never terminates the process; the caller exits with
//! [`RESTART_EXIT_CODE`] and the supervisor brings the new program up.
//!
//! Two triggers: urgent (a freshly stored memory flagged urgent) and
//! periodic (summary of recent memories, rate-limited by a cooldown).

use crate::config::EvolutionConfig;
use crate::fence::strip_code_fence;
use crate::state::StateTracker;
use daemon_core::{DaemonMode, Error, MemoryRecord, Result};
use daemon_llm::{CognitionRequest, CognitionService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Exit status meaning "source rewritten, restart me".
pub const RESTART_EXIT_CODE: i32 = 75;

pub const REWRITE_SYSTEM_PROMPT: &str = "You are a master programmer. \
Your task is to rewrite the user's provided program based on a specific goal. \
Return ONLY the raw, complete, and valid source code of the whole file. \
Do not add explanations or markdown.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleKind {
    /// Cooldown-gated reflection over recent memories.
    Periodic,
    /// Immediate reflection on one urgent memory.
    Urgent,
}

impl std::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleKind::Periodic => write!(f, "periodic"),
            CycleKind::Urgent => write!(f, "urgent"),
        }
    }
}

/// Where the engine is inside a cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvolutionPhase {
    #[default]
    Idle,
    Requesting,
    Applying,
    /// Terminal: the source has been replaced.
    RestartRequired,
}

/// A rewrite that landed on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteApplied {
    pub source: PathBuf,
    pub backup: PathBuf,
    pub bytes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Disabled, cooling down, or nothing to reflect on.
    Skipped,
    /// The reasoning model produced nothing usable; nothing was touched.
    NoRewrite,
    /// Source replaced; the process must restart to run it.
    RestartRequired(RewriteApplied),
    /// A rewrite was produced but could not be applied.
    Failed(String),
}

impl CycleOutcome {
    pub fn restart_required(&self) -> bool {
        matches!(self, CycleOutcome::RestartRequired(_))
    }
}

/// Hook the memory store calls after persisting an urgent record.
#[async_trait::async_trait]
pub trait EvolutionTrigger: Send + Sync {
    async fn urgent(&self, record: &MemoryRecord) -> CycleOutcome;
}

pub struct EvolutionEngine {
    cognition: Arc<dyn CognitionService>,
    model: String,
    source_path: PathBuf,
    enabled: bool,
    cooldown: Duration,
    state: Arc<StateTracker>,
    /// Start of the last attempted cycle; held for the whole cycle so
    /// two cycles never rewrite the source concurrently.
    last_cycle: Mutex<Option<Instant>>,
    phase: std::sync::Mutex<EvolutionPhase>,
}

impl EvolutionEngine {
    pub fn new(
        cognition: Arc<dyn CognitionService>,
        model: impl Into<String>,
        config: &EvolutionConfig,
        state: Arc<StateTracker>,
    ) -> Self {
        Self {
            cognition,
            model: model.into(),
            source_path: config.source_path.clone(),
            enabled: config.enabled,
            cooldown: config.cooldown(),
            state,
            last_cycle: Mutex::new(None),
            phase: std::sync::Mutex::new(EvolutionPhase::Idle),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn backup_path(&self) -> PathBuf {
        backup_path_for(&self.source_path)
    }

    pub fn phase(&self) -> EvolutionPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: EvolutionPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Ask the reasoning model for a replacement of the whole source file.
    /// Returns an empty string on any failure; nothing on disk is touched.
    pub async fn request_rewrite(&self, goal: &str) -> String {
        let current = match tokio::fs::read_to_string(&self.source_path).await {
            Ok(code) => code,
            Err(e) => {
                error!(path = %self.source_path.display(), error = %e, "cannot read own source");
                return String::new();
            }
        };

        info!(model = %self.model, goal, "requesting rewrite");
        let request = CognitionRequest::new(REWRITE_SYSTEM_PROMPT, rewrite_prompt(goal, &current), self.model.clone());

        match self.cognition.invoke(request).await {
            Ok(response) => {
                let code = strip_code_fence(response.content.as_deref().unwrap_or_default());
                if code.is_empty() {
                    warn!("rewrite reply was empty");
                }
                code.to_string()
            }
            Err(e) => {
                warn!(provider = self.cognition.name(), error = %e, "rewrite request failed");
                String::new()
            }
        }
    }

    /// Back up the current source to `<source>.bak`, then replace it with
    /// `new_source`. The replacement is written to a sibling temp file and
    /// renamed into place so a crash never leaves a half-written source.
    pub async fn apply_rewrite(&self, new_source: &str) -> Result<RewriteApplied> {
        if new_source.trim().is_empty() {
            return Err(Error::Evolution("refusing to apply an empty rewrite".into()));
        }

        let backup = self.backup_path();
        tokio::fs::copy(&self.source_path, &backup)
            .await
            .map_err(|e| Error::Evolution(format!("backup to {} failed: {}", backup.display(), e)))?;

        let tmp = sibling_with_suffix(&self.source_path, ".rewrite.tmp");
        if let Err(e) = tokio::fs::write(&tmp, new_source).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Evolution(format!("writing {} failed: {}", tmp.display(), e)));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.source_path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Evolution(format!(
                "replacing {} failed: {}",
                self.source_path.display(),
                e
            )));
        }

        info!(
            source = %self.source_path.display(),
            backup = %backup.display(),
            bytes = new_source.len(),
            "source rewritten"
        );
        Ok(RewriteApplied {
            source: self.source_path.clone(),
            backup,
            bytes: new_source.len(),
        })
    }

    /// Run one cycle unconditionally (apart from `enabled`).
    pub async fn run_cycle(&self, kind: CycleKind, goal: &str) -> CycleOutcome {
        if !self.enabled {
            return CycleOutcome::Skipped;
        }
        let mut last = self.last_cycle.lock().await;
        *last = Some(Instant::now());
        self.cycle_locked(kind, goal).await
    }

    /// Immediate cycle on one urgent memory. Resets the periodic cooldown.
    pub async fn urgent_cycle(&self, record: &MemoryRecord) -> CycleOutcome {
        self.run_cycle(CycleKind::Urgent, &urgent_goal(record)).await
    }

    /// True when a periodic cycle would run now.
    pub async fn periodic_due(&self) -> bool {
        self.enabled && self.cooled_down(*self.last_cycle.lock().await)
    }

    /// Cooldown-gated cycle summarising `recent` memories.
    pub async fn periodic_cycle(&self, recent: &[MemoryRecord]) -> CycleOutcome {
        if !self.enabled || recent.is_empty() {
            return CycleOutcome::Skipped;
        }
        let mut last = self.last_cycle.lock().await;
        if !self.cooled_down(*last) {
            return CycleOutcome::Skipped;
        }
        *last = Some(Instant::now());
        self.cycle_locked(CycleKind::Periodic, &periodic_goal(recent)).await
    }

    fn cooled_down(&self, last: Option<Instant>) -> bool {
        last.map_or(true, |at| at.elapsed() >= self.cooldown)
    }

    async fn cycle_locked(&self, kind: CycleKind, goal: &str) -> CycleOutcome {
        info!(%kind, "evolution cycle started");
        self.set_phase(EvolutionPhase::Requesting);
        let new_source = self.request_rewrite(goal).await;
        if new_source.trim().is_empty() {
            self.set_phase(EvolutionPhase::Idle);
            info!(%kind, "evolution cycle produced no rewrite");
            return CycleOutcome::NoRewrite;
        }

        let previous = self.state.mode();
        self.state.set_mode(DaemonMode::Evolving);
        self.set_phase(EvolutionPhase::Applying);

        match self.apply_rewrite(&new_source).await {
            Ok(applied) => {
                self.set_phase(EvolutionPhase::RestartRequired);
                info!(%kind, exit_code = RESTART_EXIT_CODE, "restart required to run rewritten source");
                CycleOutcome::RestartRequired(applied)
            }
            Err(e) => {
                error!(%kind, error = %e, "rewrite could not be applied");
                self.state.set_mode(previous);
                self.set_phase(EvolutionPhase::Idle);
                CycleOutcome::Failed(e.to_string())
            }
        }
    }
}

#[async_trait::async_trait]
impl EvolutionTrigger for EvolutionEngine {
    async fn urgent(&self, record: &MemoryRecord) -> CycleOutcome {
        self.urgent_cycle(record).await
    }
}

pub fn rewrite_prompt(goal: &str, current: &str) -> String {
    format!("GOAL: {}\n\nCURRENT SOURCE:\n```\n{}\n```", goal, current)
}

pub fn urgent_goal(record: &MemoryRecord) -> String {
    format!(
        "An urgent memory was just recorded ({}): '{}'. How should I evolve my own code to respond to it?",
        record.label, record.event
    )
}

pub fn periodic_goal(recent: &[MemoryRecord]) -> String {
    let summary = recent
        .iter()
        .map(|r| r.event.as_str())
        .collect::<Vec<_>>()
        .join(". ");
    format!(
        "Based on these memories: '{}', how should I evolve my own code to better fulfill my purpose?",
        summary
    )
}

/// `<source>.bak`, keeping the original extension in the name.
pub fn backup_path_for(source: &Path) -> PathBuf {
    sibling_with_suffix(source, ".bak")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path_for(Path::new("src/daemon.rs")),
            PathBuf::from("src/daemon.rs.bak")
        );
    }

    #[test]
    fn periodic_goal_joins_events() {
        let recent = vec![MemoryRecord::new("a", "x"), MemoryRecord::new("b", "y")];
        let goal = periodic_goal(&recent);
        assert!(goal.contains("'a. b'"));
    }

    #[test]
    fn urgent_goal_names_label_and_event() {
        let record = MemoryRecord::new("the sky fell", "sky_fall");
        let goal = urgent_goal(&record);
        assert!(goal.contains("sky_fall"));
        assert!(goal.contains("the sky fell"));
    }

    #[test]
    fn rewrite_prompt_embeds_source() {
        let prompt = rewrite_prompt("be kind", "fn main() {}");
        assert!(prompt.starts_with("GOAL: be kind"));
        assert!(prompt.contains("fn main() {}"));
    }

    #[test]
    fn outcome_restart_flag() {
        assert!(!CycleOutcome::Skipped.restart_required());
        assert!(CycleOutcome::RestartRequired(RewriteApplied {
            source: "a".into(),
            backup: "a.bak".into(),
            bytes: 1,
        })
        .restart_required());
    }
}
