//! Core memory record definitions.
//!
//! Defines [`MemoryKind`] (the five content categories), [`Importance`] (the
//! ordered retention ladder), [`MemoryMeta`] (engine-managed metadata with an
//! open `extra` bag), and [`MemoryEntry`] (a full record).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content categories for memory entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Conversational turns. Fast decay, thread-clustering input.
    Message,
    /// Reference material, permanently exempt from decay.
    Document,
    /// Agent reasoning traces. Fast decay.
    Thought,
    /// Discrete observations. Slow decay.
    Fact,
    /// Distilled or consolidated knowledge. Slowest decay.
    Knowledge,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Document => "document",
            Self::Thought => "thought",
            Self::Fact => "fact",
            Self::Knowledge => "knowledge",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "document" => Ok(Self::Document),
            "thought" => Ok(Self::Thought),
            "fact" => Ok(Self::Fact),
            "knowledge" => Ok(Self::Knowledge),
            _ => Err(format!("unknown memory kind: {s}")),
        }
    }
}

/// Retention priority. Ordered: `Low < Medium < High < Critical`.
///
/// Decay only ever moves importance down the ladder; the single raise path is
/// an explicit critical marking on the entry's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// One step down the ladder. `Low` is a floor.
    pub fn step_down(&self) -> Self {
        match self {
            Self::Critical => Self::High,
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown importance: {s}")),
        }
    }
}

/// Engine-managed metadata on a memory entry.
///
/// Fields the engine reads are typed; anything else callers want to attach
/// goes in `extra` and is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMeta {
    /// Number of times this entry has been returned by retrieval.
    #[serde(default)]
    pub access_count: u32,
    /// Timestamp of the last retrieval, or `None` if never accessed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Permanent decay exemption. Only set via explicit critical marking.
    #[serde(default)]
    pub critical: bool,
    /// Caller-supplied justification recorded at marking time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_reason: Option<String>,
    /// Source entry ids for consolidated records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub original_memory_ids: Vec<String>,
    /// Open key-value bag for caller metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A memory record. The engine's cache and the durable backend both hold these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// The full text content of the memory.
    pub content: String,
    /// Content category.
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    /// Retention priority.
    pub importance: Importance,
    /// Where this entry came from (e.g. agent name, channel, file path).
    pub source: String,
    /// Engine-managed metadata.
    #[serde(default)]
    pub meta: MemoryMeta,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Build a new entry with a generated UUID v7 id and empty metadata.
    pub fn new(
        content: impl Into<String>,
        kind: MemoryKind,
        importance: Importance,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            content: content.into(),
            kind,
            importance,
            source: source.into(),
            meta: MemoryMeta::default(),
            created_at: Utc::now(),
        }
    }

    /// Timestamp decay measures age from: last access, falling back to creation.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.meta.last_accessed.unwrap_or(self.created_at)
    }

    /// `true` if this entry is permanently exempt from decay.
    pub fn decay_exempt(&self) -> bool {
        self.meta.critical || self.kind == MemoryKind::Document
    }
}
