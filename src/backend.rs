//! Durable-store collaborator boundary.
//!
//! The engine keeps its working set in memory and writes through to a
//! [`MemoryBackend`]. The trait is storage-agnostic; [`InMemoryBackend`] is
//! the reference implementation used by tests and embedded deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::memory::types::MemoryEntry;

/// Minimal persistence API for memory entries.
///
/// `put` is an upsert; `remove` of an absent id is a no-op. Implementations
/// must be `Send + Sync` so the engine can hold them behind an `Arc`.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<MemoryEntry>>;
    async fn put(&self, entry: &MemoryEntry) -> Result<()>;
    async fn remove(&self, id: &str) -> Result<()>;
    /// All entries, oldest first.
    async fn list(&self) -> Result<Vec<MemoryEntry>>;
    async fn clear(&self) -> Result<()>;
}

/// Map-backed backend with no durability.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>>> {
        self.entries.lock().map_err(|_| anyhow!("store lock poisoned"))
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    async fn get(&self, id: &str) -> Result<Option<MemoryEntry>> {
        Ok(self.locked()?.get(id).cloned())
    }

    async fn put(&self, entry: &MemoryEntry) -> Result<()> {
        self.locked()?.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.locked()?.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MemoryEntry>> {
        let mut entries: Vec<MemoryEntry> = self.locked()?.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn clear(&self) -> Result<()> {
        self.locked()?.clear();
        Ok(())
    }
}
