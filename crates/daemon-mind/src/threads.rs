//! ThreadLibrary: named prompt threads loaded from `<patterns_dir>/*.json`
//!
//! A thread file contributes either a `system_prompt` string or an
//! `instructions` list (joined by newlines). Unreadable files are skipped.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PromptThread {
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Named canned payloads a thread may carry.
    #[serde(default)]
    pub spells: BTreeMap<String, serde_json::Value>,
}

impl PromptThread {
    /// `system_prompt` wins over `instructions`; empty when neither is set.
    pub fn prompt(&self) -> String {
        match &self.system_prompt {
            Some(prompt) => prompt.clone(),
            None => self.instructions.join("\n"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ThreadLibrary {
    threads: BTreeMap<String, PromptThread>,
}

impl ThreadLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`, keyed by file stem. A missing
    /// directory is created and yields an empty library.
    pub fn load(dir: &Path) -> Self {
        let mut library = Self::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    warn!(dir = %dir.display(), error = %e, "cannot create patterns directory");
                }
                return library;
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        for path in paths {
            library.load_file(&path);
        }
        library
    }

    /// Load or replace a single thread. Returns its name on success.
    pub fn load_file(&mut self, path: &Path) -> Option<String> {
        let name = path.file_stem()?.to_string_lossy().into_owned();
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<PromptThread>(&raw).map_err(|e| e.to_string()));
        match parsed {
            Ok(thread) => {
                info!(thread = %name, "loaded prompt thread");
                self.threads.insert(name.clone(), thread);
                Some(name)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping prompt thread");
                None
            }
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, thread: PromptThread) {
        self.threads.insert(name.into(), thread);
    }

    pub fn get(&self, name: &str) -> Option<&PromptThread> {
        self.threads.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.threads.contains_key(name)
    }

    /// Thread names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.threads.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Prompt text for `name`; empty for unknown threads.
    pub fn system_prompt(&self, name: &str) -> String {
        self.get(name).map(PromptThread::prompt).unwrap_or_default()
    }

    pub fn spell(&self, thread: &str, spell: &str) -> Option<&serde_json::Value> {
        self.get(thread)?.spells.get(spell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn loads_json_threads_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "oracle.json", r#"{"system_prompt": "Speak in riddles."}"#);
        write(dir.path(), "scribe.json", r#"{"instructions": ["Be brief.", "Cite sources."]}"#);
        write(dir.path(), "notes.txt", "ignored");
        write(dir.path(), "broken.json", "{not json");

        let library = ThreadLibrary::load(dir.path());
        assert_eq!(library.names(), vec!["oracle", "scribe"]);
        assert_eq!(library.system_prompt("oracle"), "Speak in riddles.");
        assert_eq!(library.system_prompt("scribe"), "Be brief.\nCite sources.");
        assert_eq!(library.system_prompt("missing"), "");
    }

    #[test]
    fn system_prompt_wins_over_instructions() {
        let thread = PromptThread {
            system_prompt: Some("A".into()),
            instructions: vec!["B".into()],
            ..Default::default()
        };
        assert_eq!(thread.prompt(), "A");
    }

    #[test]
    fn missing_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let patterns = dir.path().join("patterns");
        let library = ThreadLibrary::load(&patterns);
        assert!(library.is_empty());
        assert!(patterns.is_dir());
    }

    #[test]
    fn spells_are_addressable() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "mage.json",
            r#"{"instructions": [], "spells": {"light": {"power": 3}}}"#,
        );
        let library = ThreadLibrary::load(dir.path());
        assert_eq!(library.spell("mage", "light").unwrap()["power"], 3);
        assert!(library.spell("mage", "dark").is_none());
    }
}
