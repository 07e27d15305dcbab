//! Daemon Mind - memory classification, durable and semantic memory, self-rewrite cycles
//!
//! Components are constructed once by [`Daemon`] and shared by `Arc`:
//! the memory store reaches the evolution engine only through the
//! [`EvolutionTrigger`] it is handed, never through globals.

pub mod classifier;
pub mod config;
pub mod daemon;
pub mod evolution;
mod fence;
pub mod memory;
pub mod prompt;
pub mod semantic;
pub mod state;
pub mod threads;

pub use classifier::Classifier;
pub use config::DaemonConfig;
pub use daemon::{Daemon, TurnOutcome, TROUBLED_REPLY};
pub use evolution::{
    CycleKind, CycleOutcome, EvolutionEngine, EvolutionPhase, EvolutionTrigger, RewriteApplied,
    RESTART_EXIT_CODE,
};
pub use fence::strip_code_fence;
pub use memory::{MemoryLedger, MemoryStats, MemoryStore, StoredMemory, VitalLabel};
pub use prompt::PromptComposer;
pub use semantic::{MemoryArea, SemanticHit, SemanticMemory, SemanticRecord, SemanticStats};
pub use state::StateTracker;
pub use threads::{PromptThread, ThreadLibrary};
