//! The memory engine: one agent's knowledge graph, memory cache, and
//! maintenance machinery behind a single context object.
//!
//! The engine owns an in-memory map of [`MemoryEntry`] records as a cache
//! above the durable [`MemoryBackend`], a [`GraphStore`] mirror of those
//! records, and the scoring/decay/consolidation components. Call
//! [`load`](MemoryEngine::load) once before anything else; every other
//! operation returns [`MemoryError::Uninitialized`] until then.
//!
//! One engine instance per logical owner. Nothing here locks: concurrent
//! callers sharing an instance must serialize externally.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::backend::MemoryBackend;
use crate::config::{DecayConfig, EngineConfig};
use crate::error::{MemoryError, Result};
use crate::graph::store::mirror_node;
use crate::graph::{
    memory_node_id, BuildGraphResult, Direction, EdgeKind, EdgePatch, GraphPath, GraphStats,
    GraphStore, KnowledgeEdge, KnowledgeNode, NodeKind, NodeMatch, NodePatch, TaskRef,
};
use crate::journal::{Journal, JournalEntry};
use crate::memory::consolidate::{
    ConsolidateReport, ConsolidationEngine, ConsolidationStats, PruneReport,
};
use crate::memory::decay::{DecayAssessment, DecayEngine, DecayReport, DecayStats};
use crate::memory::expand::QueryExpander;
use crate::memory::relevance::{BestMemoriesOptions, RelevanceScorer, ScoredMemory, SearchOptions};
use crate::memory::similarity::{EditDistance, KeywordOverlap};
use crate::memory::threads::{ConversationThread, ThreadIdentifier};
use crate::memory::types::{Importance, MemoryEntry, MemoryKind};
use crate::semantic::SemanticIndex;

// ── Response types ───────────────────────────────────────────────────────────

/// Response from `memory_stats`.
#[derive(Debug, Serialize)]
pub struct MemoryStats {
    pub total_memories: u64,
    pub by_kind: HashMap<String, u64>,
    pub by_importance: HashMap<String, u64>,
    pub critical_memories: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_memory: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_memory: Option<DateTime<Utc>>,
}

/// Response from `inspect`: one entry with its graph and journal context.
#[derive(Debug, Serialize)]
pub struct MemoryInspection {
    pub entry: MemoryEntry,
    /// Edges incident to the entry's mirror node, if the graph carries one.
    pub graph_edges: Vec<KnowledgeEdge>,
    /// Journal entries touching this memory, newest first.
    pub journal: Vec<JournalEntry>,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct MemoryEngine {
    backend: Arc<dyn MemoryBackend>,
    index: Arc<dyn SemanticIndex>,
    config: EngineConfig,
    cache: HashMap<String, MemoryEntry>,
    graph: GraphStore,
    expander: QueryExpander,
    scorer: RelevanceScorer,
    decay: DecayEngine,
    consolidation: ConsolidationEngine,
    threads: ThreadIdentifier,
    journal: Journal,
    initialized: bool,
}

impl MemoryEngine {
    pub fn new(
        backend: Arc<dyn MemoryBackend>,
        index: Arc<dyn SemanticIndex>,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            index,
            graph: GraphStore::new(config.graph.clone()),
            expander: QueryExpander::new(config.expansion.clone()),
            scorer: RelevanceScorer::new(config.relevance.clone()),
            decay: DecayEngine::new(config.decay.clone()),
            consolidation: ConsolidationEngine::new(config.consolidation.clone()),
            threads: ThreadIdentifier::new(config.threads.clone()),
            journal: Journal::new(&config.journal),
            config,
            cache: HashMap::new(),
            initialized: false,
        }
    }

    /// Populate the cache from the backend. Must run before any other call.
    pub async fn load(&mut self) -> Result<usize> {
        let entries = self.backend.list().await?;
        let count = entries.len();
        self.cache = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
        self.initialized = true;
        tracing::info!(memories = count, "memory engine loaded");
        Ok(count)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Swap the decay parameters without rebuilding the engine.
    ///
    /// The new band is validated first; on error the old parameters stay in
    /// force.
    pub fn reconfigure_decay(&mut self, config: DecayConfig) -> Result<()> {
        config.validate()?;
        self.config.decay = config.clone();
        self.decay.reconfigure(config);
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(MemoryError::Uninitialized)
        }
    }

    // ── Memory write path ────────────────────────────────────────────────────

    /// Store a new memory, write-through to the backend.
    pub async fn add_memory(
        &mut self,
        content: impl Into<String>,
        kind: MemoryKind,
        importance: Importance,
        source: impl Into<String>,
    ) -> Result<MemoryEntry> {
        self.ensure_loaded()?;
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MemoryError::validation("content", "must not be empty"));
        }

        let entry = MemoryEntry::new(content, kind, importance, source);
        self.backend.put(&entry).await?;
        self.cache.insert(entry.id.clone(), entry.clone());
        self.journal.record(
            "create",
            &entry.id,
            Some(json!({
                "kind": entry.kind.as_str(),
                "importance": entry.importance.as_str(),
            })),
        );
        tracing::debug!(id = %entry.id, kind = %entry.kind, "memory stored");
        Ok(entry)
    }

    /// Fetch one memory, recording the access.
    ///
    /// A failed tracking write is logged, not surfaced; the read still
    /// succeeds from the cache.
    pub async fn get_memory(&mut self, id: &str) -> Result<MemoryEntry> {
        self.ensure_loaded()?;
        let entry = self
            .cache
            .get_mut(id)
            .ok_or_else(|| MemoryError::memory_not_found(id))?;
        entry.meta.access_count = entry.meta.access_count.saturating_add(1);
        entry.meta.last_accessed = Some(Utc::now());
        let snapshot = entry.clone();

        if let Err(err) = self.backend.put(&snapshot).await {
            tracing::warn!(id, "failed to persist access tracking: {err}");
        }
        self.journal.record("access", id, None);
        Ok(snapshot)
    }

    /// Permanently exempt a memory from decay and pruning.
    ///
    /// This is the single path that raises importance; it goes straight to
    /// Critical.
    pub async fn mark_critical(
        &mut self,
        id: &str,
        reason: impl Into<String>,
    ) -> Result<MemoryEntry> {
        self.ensure_loaded()?;
        let mut updated = self
            .cache
            .get(id)
            .cloned()
            .ok_or_else(|| MemoryError::memory_not_found(id))?;
        let reason = reason.into();
        updated.meta.critical = true;
        updated.meta.critical_reason = Some(reason.clone());
        updated.importance = Importance::Critical;

        self.backend.put(&updated).await?;
        self.cache.insert(updated.id.clone(), updated.clone());
        self.journal
            .record("critical", id, Some(json!({ "reason": reason })));
        tracing::info!(id, "memory marked critical");
        Ok(updated)
    }

    /// Record whether a retrieved memory was actually useful for a query.
    pub fn record_feedback(&mut self, id: &str, relevant: bool, query: Option<&str>) -> Result<()> {
        self.ensure_loaded()?;
        if !self.cache.contains_key(id) {
            return Err(MemoryError::memory_not_found(id));
        }
        self.scorer.record_feedback(id, relevant);
        self.journal.record(
            "feedback",
            id,
            Some(json!({ "relevant": relevant, "query": query })),
        );
        Ok(())
    }

    // ── Retrieval ────────────────────────────────────────────────────────────

    /// Hybrid semantic/keyword search with query expansion.
    ///
    /// Returned entries have their access tracked after scoring, so repeated
    /// retrieval slows their decay.
    pub async fn hybrid_search(
        &mut self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ScoredMemory>> {
        self.ensure_loaded()?;
        let variants = self.expander.variants(query);
        let results = self
            .scorer
            .hybrid_search(query, &variants, &self.cache, self.index.as_ref(), options)
            .await;

        let ids: Vec<String> = results.iter().map(|r| r.entry.id.clone()).collect();
        self.track_access(&ids).await;
        self.journal.record(
            "search",
            "batch:search",
            Some(json!({ "query": query, "results": results.len() })),
        );
        Ok(results)
    }

    /// Top results with slots reserved for critical/high-importance entries.
    pub async fn best_memories(
        &mut self,
        query: &str,
        limit: Option<usize>,
        options: &BestMemoriesOptions,
    ) -> Result<Vec<ScoredMemory>> {
        self.ensure_loaded()?;
        let limit = limit.unwrap_or(self.config.relevance.default_limit);
        let variants = self.expander.variants(query);
        let results = self
            .scorer
            .best_memories(
                query,
                &variants,
                &self.cache,
                self.index.as_ref(),
                limit,
                options,
            )
            .await;

        let ids: Vec<String> = results.iter().map(|r| r.entry.id.clone()).collect();
        self.track_access(&ids).await;
        self.journal.record(
            "search",
            "batch:best",
            Some(json!({ "query": query, "results": results.len() })),
        );
        Ok(results)
    }

    /// Detect whether a query continues a recent conversation thread.
    pub fn identify_thread(&self, query: &str) -> Result<Option<ConversationThread>> {
        self.ensure_loaded()?;
        let mut messages: Vec<MemoryEntry> = self
            .cache
            .values()
            .filter(|e| e.kind == MemoryKind::Message)
            .cloned()
            .collect();
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let start = messages
            .len()
            .saturating_sub(self.config.threads.recent_messages);
        Ok(self.threads.identify(query, &messages[start..]))
    }

    // ── Decay ────────────────────────────────────────────────────────────────

    /// Evaluate one memory's current decay rate without applying it.
    pub fn calculate_decay(&self, id: &str) -> Result<DecayAssessment> {
        self.ensure_loaded()?;
        let entry = self
            .cache
            .get(id)
            .ok_or_else(|| MemoryError::memory_not_found(id))?;
        Ok(self.decay.calculate(entry))
    }

    /// Run a decay pass over every cached memory.
    ///
    /// Entries whose rate crosses the step threshold have their importance
    /// lowered and persisted. A failed write leaves that entry untouched and
    /// counts as an error; the pass continues.
    pub async fn apply_decay(&mut self) -> Result<DecayReport> {
        self.ensure_loaded()?;
        let mut report = DecayReport::default();
        let mut rate_sum = 0.0f64;

        // Chronological order keeps the journal sequence stable
        let mut order: Vec<(DateTime<Utc>, String)> = self
            .cache
            .values()
            .map(|e| (e.created_at, e.id.clone()))
            .collect();
        order.sort();

        for (_, id) in order {
            let Some(snapshot) = self.cache.get(&id).cloned() else {
                continue;
            };
            report.processed += 1;
            let assessment = self.decay.calculate(&snapshot);
            if assessment.exempt {
                report.critical += 1;
                continue;
            }
            if assessment.rate <= 0.0 {
                continue;
            }
            report.decayed += 1;
            rate_sum += assessment.rate;

            if assessment.new_importance == snapshot.importance {
                continue;
            }
            let mut updated = snapshot;
            let previous = updated.importance;
            updated.importance = assessment.new_importance;
            match self.backend.put(&updated).await {
                Ok(()) => {
                    self.journal.record(
                        "decay",
                        &id,
                        Some(json!({
                            "rate": assessment.rate,
                            "from": previous.as_str(),
                            "to": assessment.new_importance.as_str(),
                        })),
                    );
                    self.cache.insert(id, updated);
                }
                Err(err) => {
                    tracing::warn!(id = %id, "failed to persist decayed memory: {err}");
                    report.errors += 1;
                }
            }
        }

        report.average_rate = if report.decayed > 0 {
            rate_sum / report.decayed as f64
        } else {
            0.0
        };
        self.decay.note_run(&report);
        self.journal.record(
            "decay",
            "batch:decay",
            Some(json!({
                "processed": report.processed,
                "decayed": report.decayed,
                "errors": report.errors,
            })),
        );
        tracing::info!(
            processed = report.processed,
            decayed = report.decayed,
            errors = report.errors,
            "decay pass complete"
        );
        Ok(report)
    }

    pub fn decay_stats(&self) -> Result<DecayStats> {
        self.ensure_loaded()?;
        Ok(self.decay.stats())
    }

    // ── Consolidation and pruning ────────────────────────────────────────────

    /// Merge near-duplicate recent memories into knowledge entries.
    ///
    /// Each group's originals are removed from the backend, cache, and graph;
    /// the merged entry takes their place. A failing group is counted and
    /// skipped without aborting the pass.
    pub async fn consolidate(&mut self) -> Result<ConsolidateReport> {
        self.ensure_loaded()?;

        let mut entries: Vec<MemoryEntry> = self.cache.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let start = entries
            .len()
            .saturating_sub(self.consolidation.config().window);
        let window = &entries[start..];

        let groups = self.consolidation.plan(window, &EditDistance);
        let mut report = ConsolidateReport {
            scanned: window.len(),
            groups_found: groups.len(),
            ..Default::default()
        };

        for group in &groups {
            let merged = {
                let members: Vec<&MemoryEntry> =
                    group.iter().filter_map(|id| self.cache.get(id)).collect();
                if members.len() != group.len() {
                    report.errors += 1;
                    continue;
                }
                match self.consolidation.merge(&members) {
                    Ok(merged) => merged,
                    Err(err) => {
                        tracing::warn!("consolidation group failed: {err}");
                        report.errors += 1;
                        continue;
                    }
                }
            };

            if let Err(err) = self.backend.put(&merged).await {
                tracing::warn!("failed to persist consolidated memory: {err}");
                report.errors += 1;
                continue;
            }

            let mut mirrored = false;
            for id in group {
                if let Err(err) = self.backend.remove(id).await {
                    tracing::warn!(id = %id, "failed to remove consolidated source: {err}");
                    report.errors += 1;
                    continue;
                }
                self.cache.remove(id);
                mirrored |= self.drop_mirror(id);
            }
            if mirrored {
                // The merged entry takes the members' place in the graph
                self.graph.add_node(mirror_node(&merged))?;
            }

            self.cache.insert(merged.id.clone(), merged.clone());
            self.journal
                .record("consolidate", &merged.id, Some(json!({ "sources": group })));
            report.memories_merged += group.len();
            report.created.push(merged.id);
        }

        self.consolidation
            .note_run(report.created.len(), report.memories_merged, 0);
        tracing::info!(
            groups = report.groups_found,
            merged = report.memories_merged,
            "consolidation pass complete"
        );
        Ok(report)
    }

    /// Remove stale low-value memories.
    ///
    /// With `dry_run` the candidates are reported but nothing is removed.
    pub async fn prune(&mut self, dry_run: bool) -> Result<PruneReport> {
        self.ensure_loaded()?;
        let mut candidates = self
            .consolidation
            .prune_candidates(self.cache.values(), Utc::now());
        candidates.sort();

        if dry_run {
            return Ok(PruneReport {
                candidates,
                removed: 0,
                dry_run: true,
            });
        }

        let mut removed = 0;
        for id in &candidates {
            match self.backend.remove(id).await {
                Ok(()) => {
                    self.cache.remove(id);
                    self.drop_mirror(id);
                    self.journal.record("prune", id, None);
                    removed += 1;
                }
                Err(err) => {
                    tracing::warn!(id = %id, "failed to prune memory: {err}");
                }
            }
        }

        self.consolidation.note_run(0, 0, removed);
        tracing::info!(removed, "prune pass complete");
        Ok(PruneReport {
            candidates,
            removed,
            dry_run: false,
        })
    }

    pub fn consolidation_stats(&self) -> Result<ConsolidationStats> {
        self.ensure_loaded()?;
        Ok(self.consolidation.stats().clone())
    }

    /// Delete a memory's mirror node, if any; reports whether one existed.
    fn drop_mirror(&mut self, memory_id: &str) -> bool {
        let node_id = memory_node_id(memory_id);
        if self.graph.get_node(&node_id).is_none() {
            return false;
        }
        self.graph.delete_node(&node_id).is_ok()
    }

    // ── Graph facade ─────────────────────────────────────────────────────────

    pub fn add_node(&mut self, node: KnowledgeNode) -> Result<()> {
        self.ensure_loaded()?;
        let id = node.id.clone();
        self.graph.add_node(node)?;
        self.journal.record("add_node", &id, None);
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Result<Option<KnowledgeNode>> {
        self.ensure_loaded()?;
        Ok(self.graph.get_node(id).cloned())
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<KnowledgeNode> {
        self.ensure_loaded()?;
        let node = self.graph.update_node(id, patch)?;
        self.journal.record("update_node", id, None);
        Ok(node)
    }

    /// Delete a node and its incident edges; reports how many edges went.
    pub fn delete_node(&mut self, id: &str) -> Result<usize> {
        self.ensure_loaded()?;
        let edges_removed = self.graph.delete_node(id)?;
        self.journal.record(
            "delete_node",
            id,
            Some(json!({ "edges_removed": edges_removed })),
        );
        Ok(edges_removed)
    }

    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        kind: EdgeKind,
        label: impl Into<String>,
        strength: Option<f64>,
    ) -> Result<KnowledgeEdge> {
        self.ensure_loaded()?;
        let edge = self.graph.add_edge(from, to, kind, label, strength)?;
        self.journal.record("add_edge", &edge.id, None);
        Ok(edge)
    }

    pub fn get_edges(&self, node_id: &str, direction: Direction) -> Result<Vec<KnowledgeEdge>> {
        self.ensure_loaded()?;
        Ok(self
            .graph
            .get_edges(node_id, direction)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn update_edge(
        &mut self,
        from: &str,
        to: &str,
        kind: EdgeKind,
        patch: EdgePatch,
    ) -> Result<KnowledgeEdge> {
        self.ensure_loaded()?;
        let edge = self.graph.update_edge(from, to, kind, patch)?;
        self.journal.record("update_edge", &edge.id, None);
        Ok(edge)
    }

    pub fn delete_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> Result<()> {
        self.ensure_loaded()?;
        self.graph.delete_edge(from, to, kind)?;
        self.journal
            .record("delete_edge", &format!("{from}->{to}"), None);
        Ok(())
    }

    pub fn find_nodes(
        &self,
        query: &str,
        kind: Option<NodeKind>,
        limit: Option<usize>,
    ) -> Result<Vec<NodeMatch>> {
        self.ensure_loaded()?;
        Ok(self.graph.find_nodes(query, kind, limit))
    }

    pub fn find_paths(&self, from: &str, to: &str, max_depth: usize) -> Result<Vec<GraphPath>> {
        self.ensure_loaded()?;
        self.graph.find_paths(from, to, max_depth)
    }

    pub fn graph_stats(&self) -> Result<GraphStats> {
        self.ensure_loaded()?;
        Ok(self.graph.stats())
    }

    /// Mirror all cached memories (and the given tasks) into the graph.
    pub fn build_graph(&mut self, tasks: &[TaskRef]) -> Result<BuildGraphResult> {
        self.ensure_loaded()?;
        let mut entries: Vec<MemoryEntry> = self.cache.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let result = self
            .graph
            .build_from_memories(&entries, tasks, &KeywordOverlap)?;
        self.journal.record(
            "build_graph",
            "batch:graph",
            Some(json!({
                "nodes_created": result.nodes_created,
                "edges_created": result.edges_created,
            })),
        );
        tracing::info!(
            nodes = result.nodes_created,
            edges = result.edges_created,
            "graph rebuilt from memories"
        );
        Ok(result)
    }

    // ── Observability ────────────────────────────────────────────────────────

    /// Counts by kind and importance, critical total, and the time range.
    pub fn memory_stats(&self) -> Result<MemoryStats> {
        self.ensure_loaded()?;
        let mut by_kind: HashMap<String, u64> = HashMap::new();
        let mut by_importance: HashMap<String, u64> = HashMap::new();
        let mut critical = 0u64;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;

        for entry in self.cache.values() {
            *by_kind.entry(entry.kind.as_str().to_string()).or_default() += 1;
            *by_importance
                .entry(entry.importance.as_str().to_string())
                .or_default() += 1;
            if entry.meta.critical {
                critical += 1;
            }
            oldest = Some(oldest.map_or(entry.created_at, |o| o.min(entry.created_at)));
            newest = Some(newest.map_or(entry.created_at, |n| n.max(entry.created_at)));
        }

        Ok(MemoryStats {
            total_memories: self.cache.len() as u64,
            by_kind,
            by_importance,
            critical_memories: critical,
            oldest_memory: oldest,
            newest_memory: newest,
        })
    }

    /// The journal tail, newest first.
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<JournalEntry>> {
        self.ensure_loaded()?;
        Ok(self.journal.recent(limit).into_iter().cloned().collect())
    }

    /// One memory with its mirrored edges and journal history.
    pub fn inspect(&self, id: &str) -> Result<MemoryInspection> {
        self.ensure_loaded()?;
        let entry = self
            .cache
            .get(id)
            .cloned()
            .ok_or_else(|| MemoryError::memory_not_found(id))?;
        let graph_edges = self
            .graph
            .get_edges(&memory_node_id(id), Direction::Both)
            .into_iter()
            .cloned()
            .collect();
        let journal = self
            .journal
            .for_subject(id, 32)
            .into_iter()
            .cloned()
            .collect();
        Ok(MemoryInspection {
            entry,
            graph_edges,
            journal,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────────────

    /// Bump access tracking for retrieved entries, best effort.
    async fn track_access(&mut self, ids: &[String]) {
        let now = Utc::now();
        for id in ids {
            let Some(entry) = self.cache.get_mut(id) else {
                continue;
            };
            entry.meta.access_count = entry.meta.access_count.saturating_add(1);
            entry.meta.last_accessed = Some(now);
            let snapshot = entry.clone();
            if let Err(err) = self.backend.put(&snapshot).await {
                tracing::warn!(id = %snapshot.id, "failed to persist access tracking: {err}");
            }
        }
    }
}
