#![allow(dead_code)]

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use mnemo::backend::{InMemoryBackend, MemoryBackend};
use mnemo::config::EngineConfig;
use mnemo::engine::MemoryEngine;
use mnemo::memory::types::{Importance, MemoryEntry, MemoryKind};
use mnemo::semantic::{SemanticHit, SemanticIndex};
use tracing_subscriber::EnvFilter;

/// Route engine logs through the test harness, honoring RUST_LOG.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Build an entry with a fixed id instead of a generated one.
pub fn entry(id: &str, content: &str, kind: MemoryKind, importance: Importance) -> MemoryEntry {
    let mut e = MemoryEntry::new(content, kind, importance, "test");
    e.id = id.to_string();
    e
}

/// Shorthand for a medium-importance fact.
pub fn fact(id: &str, content: &str) -> MemoryEntry {
    entry(id, content, MemoryKind::Fact, Importance::Medium)
}

/// Shorthand for a message-kind entry.
pub fn message(id: &str, content: &str) -> MemoryEntry {
    entry(id, content, MemoryKind::Message, Importance::Medium)
}

/// Backdate an entry's creation by whole days.
pub fn aged(mut entry: MemoryEntry, days: i64) -> MemoryEntry {
    entry.created_at = chrono::Utc::now() - chrono::Duration::days(days);
    entry
}

/// Semantic index that returns the same ranked hits for every query.
pub struct StaticIndex {
    hits: Vec<SemanticHit>,
}

impl StaticIndex {
    pub fn new(hits: &[(&str, f64)]) -> Self {
        Self {
            hits: hits
                .iter()
                .map(|(id, score)| SemanticHit {
                    id: (*id).to_string(),
                    score: *score,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl SemanticIndex for StaticIndex {
    async fn search(&self, _query: &str, limit: usize) -> anyhow::Result<Vec<SemanticHit>> {
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// Semantic index that always fails, for degradation tests.
pub struct FailingIndex;

#[async_trait]
impl SemanticIndex for FailingIndex {
    async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<SemanticHit>> {
        Err(anyhow!("semantic index offline"))
    }
}

/// Semantic index that only answers queries containing a marker term.
pub struct GatedIndex {
    needle: String,
    hits: Vec<SemanticHit>,
}

impl GatedIndex {
    pub fn new(needle: &str, hits: &[(&str, f64)]) -> Self {
        Self {
            needle: needle.to_string(),
            hits: hits
                .iter()
                .map(|(id, score)| SemanticHit {
                    id: (*id).to_string(),
                    score: *score,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl SemanticIndex for GatedIndex {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SemanticHit>> {
        if query.contains(&self.needle) {
            Ok(self.hits.iter().take(limit).cloned().collect())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Engine over a backend pre-seeded with `entries`, already loaded.
pub async fn seeded_engine(
    entries: Vec<MemoryEntry>,
    index: Arc<dyn SemanticIndex>,
) -> MemoryEngine {
    seeded_engine_with_config(entries, index, EngineConfig::default()).await
}

pub async fn seeded_engine_with_config(
    entries: Vec<MemoryEntry>,
    index: Arc<dyn SemanticIndex>,
    config: EngineConfig,
) -> MemoryEngine {
    init_tracing();
    let backend = Arc::new(InMemoryBackend::new());
    for entry in &entries {
        backend.put(entry).await.unwrap();
    }
    let mut engine = MemoryEngine::new(backend, index, config);
    engine.load().await.unwrap();
    engine
}
