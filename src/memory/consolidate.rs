//! Consolidation and pruning: merging near-duplicate recent memories into
//! knowledge entries and retiring stale low-value ones.
//!
//! The engine here is pure planning and merging over entries it is handed;
//! persistence of the merged entry and removal of the originals happen in the
//! caller. Grouping is greedy: each entry seeds at most one group, later
//! entries join the first group whose seed they resemble.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::ConsolidationConfig;
use crate::error::{MemoryError, Result};
use crate::memory::similarity::Similarity;
use crate::memory::types::{Importance, MemoryEntry, MemoryKind};

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
pub struct ConsolidateReport {
    /// Entries in the scanned window.
    pub scanned: usize,
    pub groups_found: usize,
    /// Originals absorbed into merged entries.
    pub memories_merged: usize,
    /// Ids of the merged entries that were created.
    pub created: Vec<String>,
    /// Groups that failed to merge; the rest of the run continues.
    pub errors: usize,
}

#[derive(Debug, Serialize)]
pub struct PruneReport {
    pub candidates: Vec<String>,
    pub removed: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationStats {
    pub runs: u64,
    pub groups_merged: u64,
    pub memories_merged: u64,
    pub memories_pruned: u64,
    pub last_run: Option<DateTime<Utc>>,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct ConsolidationEngine {
    config: ConsolidationConfig,
    stats: ConsolidationStats,
}

impl ConsolidationEngine {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self {
            config,
            stats: ConsolidationStats::default(),
        }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Group a chronological window of entries by content similarity.
    ///
    /// Windows below the configured minimum are skipped entirely. Decay-exempt
    /// entries (critical or document kind) never join a group: the merged
    /// record is plain knowledge, so merging would void their retention
    /// guarantee. Only groups of two or more come back.
    pub fn plan(&self, window: &[MemoryEntry], similarity: &dyn Similarity) -> Vec<Vec<String>> {
        if window.len() < self.config.min_window {
            debug!(
                window = window.len(),
                min = self.config.min_window,
                "window below consolidation minimum, skipping"
            );
            return Vec::new();
        }

        let mut processed: HashSet<String> = HashSet::new();
        let mut groups = Vec::new();

        for (i, seed) in window.iter().enumerate() {
            if processed.contains(&seed.id) || seed.decay_exempt() {
                continue;
            }

            // Gather later entries that resemble the seed
            let mut members = vec![seed.id.clone()];
            for other in &window[i + 1..] {
                if processed.contains(&other.id) || other.decay_exempt() {
                    continue;
                }
                if similarity.score(&seed.content, &other.content)
                    > self.config.similarity_threshold
                {
                    members.push(other.id.clone());
                }
            }

            if members.len() < 2 {
                continue;
            }
            for id in &members {
                processed.insert(id.clone());
            }
            groups.push(members);
        }

        groups
    }

    /// Merge a group into a single knowledge entry.
    ///
    /// Content is joined in the order given, importance is the maximum across
    /// members, and the source comes from the most recently touched member.
    /// The originals' ids are kept in the merged entry's metadata.
    pub fn merge(&self, members: &[&MemoryEntry]) -> Result<MemoryEntry> {
        let ids: Vec<String> = members.iter().map(|m| m.id.clone()).collect();
        if members.len() < 2 {
            return Err(MemoryError::consolidation(
                &ids,
                "a merge group needs at least two members",
            ));
        }

        let content: String = members
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let importance = members
            .iter()
            .map(|m| m.importance)
            .max()
            .unwrap_or(Importance::Medium);
        let source = members
            .iter()
            .max_by_key(|m| m.last_touched())
            .map(|m| m.source.clone())
            .unwrap_or_default();

        let mut merged = MemoryEntry::new(content, MemoryKind::Knowledge, importance, source);
        merged.meta.original_memory_ids = ids;
        Ok(merged)
    }

    /// Ids eligible for pruning: low importance, rarely accessed, and idle.
    ///
    /// All three conditions must hold. Critical and document entries are
    /// never candidates.
    pub fn prune_candidates<'a>(
        &self,
        entries: impl Iterator<Item = &'a MemoryEntry>,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        entries
            .filter(|entry| {
                if entry.decay_exempt() || entry.importance != Importance::Low {
                    return false;
                }
                if entry.meta.access_count >= self.config.prune_min_access {
                    return false;
                }
                let idle_days = (now - entry.last_touched()).num_seconds() as f64 / 86_400.0;
                idle_days > self.config.prune_idle_days as f64
            })
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Fold a completed run into the running totals.
    pub fn note_run(&mut self, groups: usize, merged: usize, pruned: usize) {
        self.stats.runs += 1;
        self.stats.groups_merged += groups as u64;
        self.stats.memories_merged += merged as u64;
        self.stats.memories_pruned += pruned as u64;
        self.stats.last_run = Some(Utc::now());
    }

    pub fn stats(&self) -> &ConsolidationStats {
        &self.stats
    }
}
