//! Core types for the Daemon: memory tiers, records, classification results, modes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durability/importance class a memory record is filed under.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Vital,
    LongTerm,
    ShortTerm,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Vital, Tier::LongTerm, Tier::ShortTerm];

    /// Wire tag used by the classification schema and the memory file keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Vital => "vital",
            Tier::LongTerm => "long_term",
            Tier::ShortTerm => "short_term",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "vital" => Some(Tier::Vital),
            "long_term" => Some(Tier::LongTerm),
            "short_term" => Some(Tier::ShortTerm),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tier as reported by the cognition service. Values outside the schema's
/// enum are carried verbatim so the store can apply its default bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TierTag {
    Known(Tier),
    Unrecognized(String),
}

impl TierTag {
    pub fn parse(tag: &str) -> Self {
        match Tier::from_tag(tag) {
            Some(tier) => TierTag::Known(tier),
            None => TierTag::Unrecognized(tag.to_string()),
        }
    }

    /// Tier the record is filed under. Unrecognized tags land in short-term.
    pub fn resolve(&self) -> Tier {
        match self {
            TierTag::Known(tier) => *tier,
            TierTag::Unrecognized(_) => Tier::ShortTerm,
        }
    }
}

impl From<Tier> for TierTag {
    fn from(tier: Tier) -> Self {
        TierTag::Known(tier)
    }
}

/// A classified, persisted memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(alias = "uid")]
    pub id: String,
    pub event: String,
    #[serde(rename = "mnemonic")]
    pub label: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// New record with a fresh v4 id, stamped now.
    pub fn new(event: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event: event.into(),
            label: label.into(),
            created_at: Utc::now(),
        }
    }
}

/// Why the classifier substituted a default result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    /// The cognition service call itself failed.
    ServiceError,
    /// The reply carried no usable content.
    EmptyResponse,
    /// The content was not valid JSON.
    JsonDecode,
    /// The JSON was missing required fields or had the wrong shape.
    InvalidStructure,
}

impl FallbackReason {
    /// Diagnostic label stored in place of a mnemonic.
    pub fn label(self) -> &'static str {
        match self {
            FallbackReason::ServiceError => "error",
            FallbackReason::EmptyResponse => "empty_llm_response",
            FallbackReason::JsonDecode => "json_decode_error",
            FallbackReason::InvalidStructure => "invalid_response_structure",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome of classifying one event. Ephemeral: consumed to build a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassificationResult {
    pub tier: TierTag,
    pub label: String,
    pub urgent: bool,
    pub fallback: Option<FallbackReason>,
}

impl ClassificationResult {
    pub fn fallback(reason: FallbackReason) -> Self {
        Self {
            tier: TierTag::Known(Tier::ShortTerm),
            label: reason.label().to_string(),
            urgent: false,
            fallback: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// The Daemon's current state of being.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonMode {
    #[default]
    Idle,
    Listening,
    Thinking,
    Responding,
    SelfReflecting,
    Evolving,
}

impl std::fmt::Display for DaemonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Thinking => write!(f, "thinking"),
            Self::Responding => write!(f, "responding"),
            Self::SelfReflecting => write!(f, "self-reflecting"),
            Self::Evolving => write!(f, "evolving"),
        }
    }
}
