//! MemoryStore: three-tier durable memory in a single JSON file
//!
//! File shape: `{"vital": [..], "long_term": [..], "short_term": [..]}`,
//! each record `{"id", "event", "mnemonic", "timestamp"}` (`uid` is still
//! accepted on read for older files). Loading never
//! fails: a missing, unreadable or malformed file is replaced by the empty
//! structure. Every successful store rewrites the whole file atomically.

use crate::classifier::Classifier;
use crate::evolution::{CycleOutcome, EvolutionTrigger};
use daemon_core::{ClassificationResult, Error, MemoryRecord, Result, Tier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// The full on-disk contents, tier by tier, each in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryLedger {
    #[serde(default)]
    pub vital: Vec<MemoryRecord>,
    #[serde(default)]
    pub long_term: Vec<MemoryRecord>,
    #[serde(default)]
    pub short_term: Vec<MemoryRecord>,
}

impl MemoryLedger {
    pub fn tier(&self, tier: Tier) -> &[MemoryRecord] {
        match tier {
            Tier::Vital => &self.vital,
            Tier::LongTerm => &self.long_term,
            Tier::ShortTerm => &self.short_term,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut Vec<MemoryRecord> {
        match tier {
            Tier::Vital => &mut self.vital,
            Tier::LongTerm => &mut self.long_term,
            Tier::ShortTerm => &mut self.short_term,
        }
    }

    pub fn len(&self) -> usize {
        self.vital.len() + self.long_term.len() + self.short_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records across tiers, oldest first.
    pub fn chronological(&self) -> Vec<MemoryRecord> {
        let mut all: Vec<MemoryRecord> = Tier::ALL
            .iter()
            .flat_map(|t| self.tier(*t).iter().cloned())
            .collect();
        all.sort_by_key(|r| r.created_at);
        all
    }
}

/// Identifier and label of one vital memory, as shown in the system prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VitalLabel {
    pub id: String,
    pub label: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub vital: usize,
    pub long_term: usize,
    pub short_term: usize,
}

impl MemoryStats {
    pub fn total(&self) -> usize {
        self.vital + self.long_term + self.short_term
    }
}

impl std::fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "vital: {}, long_term: {}, short_term: {}",
            self.vital, self.long_term, self.short_term
        )
    }
}

/// Result of one successful `store_memory`.
#[derive(Clone, Debug)]
pub struct StoredMemory {
    pub record: MemoryRecord,
    pub tier: Tier,
    pub classification: ClassificationResult,
    /// Set when the record was urgent and an evolution trigger is linked.
    pub evolution: Option<CycleOutcome>,
}

impl StoredMemory {
    pub fn restart_required(&self) -> bool {
        self.evolution.as_ref().is_some_and(|o| o.restart_required())
    }
}

pub struct MemoryStore {
    path: PathBuf,
    ledger: Mutex<MemoryLedger>,
    classifier: Classifier,
    trigger: Option<Arc<dyn EvolutionTrigger>>,
}

impl MemoryStore {
    /// Load (or heal) the memory file at `path`.
    pub fn load(path: impl Into<PathBuf>, classifier: Classifier) -> Self {
        let path = path.into();
        let ledger = load_ledger(&path);
        info!(
            path = %path.display(),
            vital = ledger.vital.len(),
            long_term = ledger.long_term.len(),
            short_term = ledger.short_term.len(),
            "memory loaded"
        );
        Self {
            path,
            ledger: Mutex::new(ledger),
            classifier,
            trigger: None,
        }
    }

    /// Link the hook run after an urgent record is persisted.
    pub fn with_trigger(mut self, trigger: Arc<dyn EvolutionTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classify `event`, file it under its tier, persist the whole store,
    /// and fire the evolution trigger if the classification was urgent.
    ///
    /// On a persistence failure the in-memory append is rolled back so the
    /// store never holds a record the file lacks.
    pub async fn store_memory(&self, event: &str) -> Result<StoredMemory> {
        let classification = self.classifier.classify(event).await;
        let tier = classification.tier.resolve();
        let record = MemoryRecord::new(event, classification.label.clone());

        {
            let mut ledger = self.ledger.lock().await;
            ledger.tier_mut(tier).push(record.clone());
            if let Err(e) = save_ledger(&self.path, &ledger) {
                ledger.tier_mut(tier).pop();
                error!(path = %self.path.display(), error = %e, "memory save failed");
                return Err(e);
            }
        }
        debug!(id = %record.id, %tier, label = %record.label, "memory stored");

        let evolution = match (&self.trigger, classification.urgent) {
            (Some(trigger), true) => {
                info!(id = %record.id, label = %record.label, "urgent memory, triggering evolution");
                Some(trigger.urgent(&record).await)
            }
            _ => None,
        };

        Ok(StoredMemory {
            record,
            tier,
            classification,
            evolution,
        })
    }

    pub async fn vital_labels(&self) -> Vec<VitalLabel> {
        self.ledger
            .lock()
            .await
            .vital
            .iter()
            .map(|r| VitalLabel {
                id: r.id.clone(),
                label: r.label.clone(),
            })
            .collect()
    }

    pub async fn vital(&self) -> Vec<MemoryRecord> {
        self.ledger.lock().await.vital.clone()
    }

    pub async fn long_term(&self) -> Vec<MemoryRecord> {
        self.ledger.lock().await.long_term.clone()
    }

    pub async fn short_term(&self) -> Vec<MemoryRecord> {
        self.ledger.lock().await.short_term.clone()
    }

    /// The `n` most recent records across all tiers, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<MemoryRecord> {
        let all = self.ledger.lock().await.chronological();
        let skip = all.len().saturating_sub(n);
        all.into_iter().skip(skip).collect()
    }

    pub async fn stats(&self) -> MemoryStats {
        let ledger = self.ledger.lock().await;
        MemoryStats {
            vital: ledger.vital.len(),
            long_term: ledger.long_term.len(),
            short_term: ledger.short_term.len(),
        }
    }

    pub async fn snapshot(&self) -> MemoryLedger {
        self.ledger.lock().await.clone()
    }
}

/// Read the memory file, healing it to the empty structure when it is
/// absent, unreadable or malformed.
pub fn load_ledger(path: &Path) -> MemoryLedger {
    let parsed = match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str::<MemoryLedger>(&content).map_err(|e| {
            warn!(path = %path.display(), error = %e, "memory file is corrupt, starting empty");
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no memory file, starting empty");
            Err(())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "memory file unreadable, starting empty");
            Err(())
        }
    };

    match parsed {
        Ok(ledger) => ledger,
        Err(()) => {
            let empty = MemoryLedger::default();
            if let Err(e) = save_ledger(path, &empty) {
                error!(path = %path.display(), error = %e, "could not write empty memory file");
            }
            empty
        }
    }
}

/// Write the whole ledger: temp file in the same directory, then rename.
pub fn save_ledger(path: &Path, ledger: &MemoryLedger) -> Result<()> {
    write_json_atomic(path, ledger)
}

/// Pretty JSON to `<path>.tmp`, then rename over `path`.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        Error::Memory(format!("replacing {} failed: {}", path.display(), e))
    })
}
