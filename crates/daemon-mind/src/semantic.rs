//! SemanticMemory: searchable store of free-text memories
//!
//! Records are grouped into areas and kept in one JSON file
//! (`{"records": [...]}`). Search ranks records by cosine similarity of
//! hashed bag-of-words vectors. Vectors are never persisted; they are
//! rebuilt from the text on load, so the file stays readable and the
//! hashing may change between builds without invalidating it.

use crate::memory::write_json_atomic;
use chrono::{DateTime, Utc};
use daemon_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Width of the hashed text vectors.
pub const VECTOR_DIMENSIONS: usize = 384;

/// Minimum score for a memory to be woven into a conversation prompt.
pub const CONTEXT_MIN_SCORE: f32 = 0.4;

/// Minimum score for console search results.
pub const SEARCH_MIN_SCORE: f32 = 0.3;

// =============================================================================
// Records
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryArea {
    /// Raw pieces of experience.
    #[default]
    Fragments,
    /// Consolidated insights.
    Solutions,
    /// Conversation exchanges.
    Contemplations,
    /// Procedures and tools.
    Instruments,
}

impl MemoryArea {
    pub const ALL: [MemoryArea; 4] = [
        MemoryArea::Fragments,
        MemoryArea::Solutions,
        MemoryArea::Contemplations,
        MemoryArea::Instruments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryArea::Fragments => "fragments",
            MemoryArea::Solutions => "solutions",
            MemoryArea::Contemplations => "contemplations",
            MemoryArea::Instruments => "instruments",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            MemoryArea::Fragments => "📝",
            MemoryArea::Solutions => "💡",
            MemoryArea::Contemplations => "🤔",
            MemoryArea::Instruments => "🔧",
        }
    }
}

impl std::fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryArea {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MemoryArea::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| Error::Memory(format!("unknown memory area: {}", s)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub area: MemoryArea,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl SemanticRecord {
    pub fn new(text: impl Into<String>, area: MemoryArea, metadata: BTreeMap<String, String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            area,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// One search result, best first.
#[derive(Clone, Debug, PartialEq)]
pub struct SemanticHit {
    pub record: SemanticRecord,
    pub score: f32,
    pub rank: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SemanticStats {
    pub total: usize,
    pub areas: BTreeMap<MemoryArea, usize>,
    pub dimensions: usize,
}

impl std::fmt::Display for SemanticStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} records", self.total)?;
        if !self.areas.is_empty() {
            let areas: Vec<String> = self.areas.iter().map(|(a, n)| format!("{}: {}", a, n)).collect();
            write!(f, " ({})", areas.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Default, Serialize, Deserialize)]
struct SemanticFile {
    #[serde(default)]
    records: Vec<SemanticRecord>,
}

// =============================================================================
// Store
// =============================================================================

#[derive(Default)]
struct Index {
    records: Vec<SemanticRecord>,
    vectors: Vec<Vec<f32>>,
}

impl Index {
    fn push(&mut self, record: SemanticRecord) {
        self.vectors.push(embed_text(&record.text));
        self.records.push(record);
    }

    fn pop(&mut self) {
        self.records.pop();
        self.vectors.pop();
    }
}

pub struct SemanticMemory {
    path: PathBuf,
    index: Mutex<Index>,
}

impl SemanticMemory {
    /// Load the semantic file at `path`. Missing or unreadable files start empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<SemanticFile>(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "semantic memory is corrupt, starting empty");
                SemanticFile::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SemanticFile::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "semantic memory unreadable, starting empty");
                SemanticFile::default()
            }
        };

        let mut index = Index::default();
        for record in file.records {
            index.push(record);
        }
        info!(path = %path.display(), records = index.records.len(), "semantic memory loaded");
        Self {
            path,
            index: Mutex::new(index),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store `text` in `area`. Returns the new id, or `None` for blank text
    /// and exact duplicates. On a failed write nothing is kept in memory.
    pub async fn store(
        &self,
        text: &str,
        area: MemoryArea,
        metadata: BTreeMap<String, String>,
    ) -> Result<Option<String>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut index = self.index.lock().await;
        if index.records.iter().any(|r| r.text == text) {
            debug!(%area, "duplicate semantic memory skipped");
            return Ok(None);
        }

        let record = SemanticRecord::new(text, area, metadata);
        let id = record.id.clone();
        index.push(record);

        let file = SemanticFile {
            records: index.records.clone(),
        };
        if let Err(e) = write_json_atomic(&self.path, &file) {
            index.pop();
            return Err(e);
        }
        debug!(%area, id = %id, chars = text.len(), "semantic memory stored");
        Ok(Some(id))
    }

    /// Up to `top_k` records scoring at least `min_score`, best first.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        area: Option<MemoryArea>,
        min_score: f32,
    ) -> Vec<SemanticHit> {
        let query_vector = embed_text(query);
        let index = self.index.lock().await;

        let mut scored: Vec<(usize, f32)> = index
            .vectors
            .iter()
            .enumerate()
            .filter(|(i, _)| area.map_or(true, |a| index.records[*i].area == a))
            .map(|(i, v)| (i, cosine(&query_vector, v)))
            .filter(|(_, score)| *score >= min_score && *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(rank, (i, score))| SemanticHit {
                record: index.records[i].clone(),
                score,
                rank,
            })
            .collect()
    }

    pub async fn by_area(&self, area: MemoryArea) -> Vec<SemanticRecord> {
        let index = self.index.lock().await;
        index.records.iter().filter(|r| r.area == area).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> SemanticStats {
        let index = self.index.lock().await;
        let mut areas = BTreeMap::new();
        for record in &index.records {
            *areas.entry(record.area).or_insert(0) += 1;
        }
        SemanticStats {
            total: index.records.len(),
            areas,
            dimensions: VECTOR_DIMENSIONS,
        }
    }

    /// "Relevant Memories" block for a conversation prompt; empty when
    /// nothing relevant is stored.
    pub async fn context_for(&self, user_input: &str, max_memories: usize) -> String {
        if max_memories == 0 {
            return String::new();
        }
        let hits = self.search(user_input, max_memories, None, CONTEXT_MIN_SCORE).await;
        if hits.is_empty() {
            return String::new();
        }
        let mut lines = vec!["## Relevant Memories:".to_string()];
        for hit in hits {
            lines.push(format!(
                "{} [{}] {}... (relevance: {:.2})",
                hit.record.area.icon(),
                hit.record.area,
                preview(&hit.record.text, 200),
                hit.score
            ));
        }
        lines.join("\n")
    }

    /// Console rendering of a search.
    pub async fn search_and_format(&self, query: &str, max_results: usize) -> String {
        let hits = self.search(query, max_results, None, SEARCH_MIN_SCORE).await;
        if hits.is_empty() {
            return format!("No memories found for: {}", query);
        }
        let mut lines = vec![format!("🔍 Memory search results for '{}':", query)];
        for hit in hits {
            lines.push(format!(
                "{}. {} [{}] {}... (score: {:.2})",
                hit.rank + 1,
                hit.record.area.icon(),
                hit.record.area,
                preview(&hit.record.text, 150),
                hit.score
            ));
        }
        lines.join("\n")
    }
}

// =============================================================================
// Vectors
// =============================================================================

/// Unit-length hashed bag-of-words vector. Text without any word yields zeros.
pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; VECTOR_DIMENSIONS];
    for token in tokens(text) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % VECTOR_DIMENSIONS as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Dot product of two unit vectors.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn vectors_are_unit_length() {
        let v = embed_text("The Architect spoke of stars");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert!(embed_text("  ...  ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn identical_text_scores_one() {
        let a = embed_text("moonlight over the sea");
        let b = embed_text("Moonlight, over the SEA!");
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn area_parses_and_displays() {
        assert_eq!("Contemplations".parse::<MemoryArea>().unwrap(), MemoryArea::Contemplations);
        assert!("dreams".parse::<MemoryArea>().is_err());
        assert_eq!(MemoryArea::Solutions.to_string(), "solutions");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("café 🔮 glow", 6), "café 🔮");
        assert_eq!(preview("short", 10), "short");
    }

    #[tokio::test]
    async fn search_ranks_related_text_first() {
        let dir = tempfile::tempdir().unwrap();
        let memory = SemanticMemory::load(dir.path().join("index.json"));
        memory
            .store("The Architect asked about the stars and the night sky", MemoryArea::Contemplations, meta(&[]))
            .await
            .unwrap();
        memory
            .store("Bread needs flour, water and salt", MemoryArea::Fragments, meta(&[]))
            .await
            .unwrap();

        let hits = memory.search("stars in the night sky", 5, None, 0.0).await;
        assert_eq!(hits[0].rank, 0);
        assert!(hits[0].record.text.contains("stars"));
        if let Some(second) = hits.get(1) {
            assert!(second.score <= hits[0].score);
        }
    }

    #[tokio::test]
    async fn duplicates_and_blank_text_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let memory = SemanticMemory::load(dir.path().join("index.json"));
        assert!(memory.store("once", MemoryArea::Fragments, meta(&[])).await.unwrap().is_some());
        assert!(memory.store("once", MemoryArea::Solutions, meta(&[])).await.unwrap().is_none());
        assert!(memory.store("   ", MemoryArea::Fragments, meta(&[])).await.unwrap().is_none());
        assert_eq!(memory.len().await, 1);
    }

    #[tokio::test]
    async fn area_filter_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let memory = SemanticMemory::load(dir.path().join("index.json"));
        memory.store("red apple", MemoryArea::Fragments, meta(&[])).await.unwrap();
        memory.store("red apple pie recipe", MemoryArea::Instruments, meta(&[])).await.unwrap();
        memory.store("green apple", MemoryArea::Fragments, meta(&[])).await.unwrap();

        let hits = memory.search("red apple", 10, Some(MemoryArea::Instruments), 0.0).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.area, MemoryArea::Instruments);

        let stats = memory.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.areas[&MemoryArea::Fragments], 2);
        assert_eq!(stats.areas[&MemoryArea::Instruments], 1);
        assert_eq!(stats.to_string(), "3 records (fragments: 2, instruments: 1)");
        assert_eq!(memory.by_area(MemoryArea::Fragments).await.len(), 2);
    }

    #[tokio::test]
    async fn reload_keeps_records_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory").join("index.json");
        let memory = SemanticMemory::load(&path);
        let id = memory
            .store("User: hi\nDaemon: hello", MemoryArea::Contemplations, meta(&[("thread", "none")]))
            .await
            .unwrap()
            .unwrap();

        let reloaded = SemanticMemory::load(&path);
        let hits = reloaded.search("hi hello", 1, None, 0.0).await;
        assert_eq!(hits[0].record.id, id);
        assert_eq!(hits[0].record.metadata["thread"], "none");
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "not json").unwrap();
        let memory = SemanticMemory::load(&path);
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn failed_write_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // The parent is a file, so the directory cannot be created.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let memory = SemanticMemory::load(blocker.join("index.json"));
        assert!(memory.store("lost", MemoryArea::Fragments, meta(&[])).await.is_err());
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn context_and_console_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let memory = SemanticMemory::load(dir.path().join("index.json"));
        assert_eq!(memory.context_for("anything", 5).await, "");
        assert_eq!(memory.search_and_format("ghosts", 5).await, "No memories found for: ghosts");

        memory
            .store("the lighthouse keeper sang", MemoryArea::Contemplations, meta(&[]))
            .await
            .unwrap();
        let context = memory.context_for("the lighthouse keeper sang", 5).await;
        assert!(context.starts_with("## Relevant Memories:\n🤔 [contemplations] the lighthouse keeper sang..."));
        assert_eq!(memory.context_for("the lighthouse keeper sang", 0).await, "");

        let listing = memory.search_and_format("lighthouse keeper", 5).await;
        assert!(listing.starts_with("🔍 Memory search results for 'lighthouse keeper':\n1. 🤔 [contemplations]"));
    }
}
