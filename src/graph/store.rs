//! In-memory knowledge graph: nodes, edges, traversal, and path finding.
//!
//! [`GraphStore`] holds typed nodes and directed edges with an undirected
//! adjacency index. Structural mutations validate fully before touching state,
//! so a returned error never leaves dangling adjacency entries. One store per
//! agent; concurrent callers serialize externally.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::config::GraphConfig;
use crate::error::{MemoryError, Result};
use crate::graph::types::{
    Direction, EdgeKind, EdgePatch, GraphPath, GraphStats, KnowledgeEdge, KnowledgeNode,
    NodeKind, NodeMatch, NodePatch,
};
use crate::memory::similarity::Similarity;
use crate::memory::types::{MemoryEntry, MemoryKind};

/// Uniqueness key for an edge.
type EdgeKey = (String, String, EdgeKind);

/// A task goal to link mirrored memories against.
#[derive(Debug, Clone)]
pub struct TaskRef {
    pub id: String,
    pub goal: String,
}

/// Result returned from a bulk graph build.
#[derive(Debug, Serialize)]
pub struct BuildGraphResult {
    pub nodes_created: usize,
    pub edges_created: usize,
}

/// Typed in-memory knowledge graph.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: HashMap<String, KnowledgeNode>,
    /// Insertion order, for deterministic search tie-breaks and traversal.
    node_order: Vec<String>,
    edges: HashMap<EdgeKey, KnowledgeEdge>,
    edge_order: Vec<EdgeKey>,
    /// Undirected neighbor index, insertion-ordered, no duplicates.
    adjacency: HashMap<String, Vec<String>>,
    config: GraphConfig,
}

impl GraphStore {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    // ── Node CRUD ────────────────────────────────────────────────────────────

    /// Insert a node. Fails on empty label or duplicate id, leaving the store
    /// unchanged.
    pub fn add_node(&mut self, node: KnowledgeNode) -> Result<()> {
        // 1. Validate
        if node.label.trim().is_empty() {
            return Err(MemoryError::validation("label", "must not be empty"));
        }

        // 2. Duplicate gate
        if self.nodes.contains_key(&node.id) {
            return Err(MemoryError::DuplicateNode {
                id: node.id.clone(),
            });
        }

        // 3. Insert and initialize adjacency
        self.node_order.push(node.id.clone());
        self.adjacency.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Option<&KnowledgeNode> {
        self.nodes.get(id)
    }

    /// Apply a partial update. `None` fields are left untouched.
    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<KnowledgeNode> {
        if let Some(label) = &patch.label {
            if label.trim().is_empty() {
                return Err(MemoryError::validation("label", "must not be empty"));
            }
        }

        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| MemoryError::node_not_found(id))?;

        if let Some(label) = patch.label {
            node.label = label;
        }
        if let Some(description) = patch.description {
            node.description = description;
        }
        if let Some(tags) = patch.tags {
            node.tags = tags;
        }
        if let Some(metadata) = patch.metadata {
            node.metadata = Some(metadata);
        }
        Ok(node.clone())
    }

    /// Remove a node and every incident edge. Returns the number of edges removed.
    pub fn delete_node(&mut self, id: &str) -> Result<usize> {
        if !self.nodes.contains_key(id) {
            return Err(MemoryError::node_not_found(id));
        }

        // 1. Collect incident edges
        let incident: Vec<EdgeKey> = self
            .edge_order
            .iter()
            .filter(|(from, to, _)| from == id || to == id)
            .cloned()
            .collect();

        // 2. Remove them and their adjacency entries on the far endpoint
        for key in &incident {
            self.edges.remove(key);
            let other = if key.0 == id { &key.1 } else { &key.0 };
            if let Some(neighbors) = self.adjacency.get_mut(other) {
                neighbors.retain(|n| n != id);
            }
        }
        self.edge_order.retain(|key| !incident.contains(key));

        // 3. Remove the node itself
        self.adjacency.remove(id);
        self.node_order.retain(|n| n != id);
        self.nodes.remove(id);

        Ok(incident.len())
    }

    // ── Edge CRUD ────────────────────────────────────────────────────────────

    /// Insert a directed edge between two existing nodes.
    ///
    /// Fails on out-of-range strength, missing endpoint, or an existing
    /// `(from, to, kind)` triple, checked in that order before any mutation.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        kind: EdgeKind,
        label: impl Into<String>,
        strength: Option<f64>,
    ) -> Result<KnowledgeEdge> {
        // 1. Validate strength
        if let Some(s) = strength {
            if !(0.0..=1.0).contains(&s) {
                return Err(MemoryError::validation(
                    "strength",
                    format!("{s} outside [0.0, 1.0]"),
                ));
            }
        }

        // 2. Both endpoints must exist
        if !self.nodes.contains_key(from) {
            return Err(MemoryError::node_not_found(from));
        }
        if !self.nodes.contains_key(to) {
            return Err(MemoryError::node_not_found(to));
        }

        // 3. Duplicate triple gate
        let key: EdgeKey = (from.to_string(), to.to_string(), kind);
        if self.edges.contains_key(&key) {
            return Err(MemoryError::DuplicateEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind: kind.as_str().to_string(),
            });
        }

        // 4. Insert and index both endpoints
        let edge = KnowledgeEdge {
            id: uuid::Uuid::now_v7().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            kind,
            label: label.into(),
            strength,
            created_at: chrono::Utc::now(),
        };
        self.link_adjacency(from, to);
        self.edge_order.push(key.clone());
        self.edges.insert(key, edge.clone());
        Ok(edge)
    }

    /// Edges touching a node, filtered by direction. Empty for an edgeless or
    /// unknown node.
    pub fn get_edges(&self, node_id: &str, direction: Direction) -> Vec<&KnowledgeEdge> {
        self.edge_order
            .iter()
            .filter(|(from, to, _)| match direction {
                Direction::Outgoing => from == node_id,
                Direction::Incoming => to == node_id,
                Direction::Both => from == node_id || to == node_id,
            })
            .filter_map(|key| self.edges.get(key))
            .collect()
    }

    /// Apply a partial update to the edge with this exact triple.
    pub fn update_edge(
        &mut self,
        from: &str,
        to: &str,
        kind: EdgeKind,
        patch: EdgePatch,
    ) -> Result<KnowledgeEdge> {
        if let Some(s) = patch.strength {
            if !(0.0..=1.0).contains(&s) {
                return Err(MemoryError::validation(
                    "strength",
                    format!("{s} outside [0.0, 1.0]"),
                ));
            }
        }

        let key: EdgeKey = (from.to_string(), to.to_string(), kind);
        let edge = self
            .edges
            .get_mut(&key)
            .ok_or_else(|| MemoryError::edge_not_found(format!("{from} -[{kind}]-> {to}")))?;

        if let Some(label) = patch.label {
            edge.label = label;
        }
        if let Some(strength) = patch.strength {
            edge.strength = Some(strength);
        }
        Ok(edge.clone())
    }

    /// Remove the edge with this exact triple.
    pub fn delete_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> Result<()> {
        let key: EdgeKey = (from.to_string(), to.to_string(), kind);
        if self.edges.remove(&key).is_none() {
            return Err(MemoryError::edge_not_found(format!(
                "{from} -[{kind}]-> {to}"
            )));
        }
        self.edge_order.retain(|k| k != &key);

        // Drop adjacency only when no edge of any kind still connects the pair
        if self.edge_between(from, to).is_none() {
            if let Some(neighbors) = self.adjacency.get_mut(from) {
                neighbors.retain(|n| n != to);
            }
            if let Some(neighbors) = self.adjacency.get_mut(to) {
                neighbors.retain(|n| n != from);
            }
        }
        Ok(())
    }

    // ── Search ───────────────────────────────────────────────────────────────

    /// Case-insensitive substring search over label, description, and tags.
    ///
    /// Matches score label 3, description 2, tags 1 (additive); ties keep
    /// insertion order. Capped at `limit`, defaulting to the configured cap.
    pub fn find_nodes(
        &self,
        query: &str,
        kind: Option<NodeKind>,
        limit: Option<usize>,
    ) -> Vec<NodeMatch> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let limit = limit.unwrap_or(self.config.find_limit);

        let mut matches: Vec<NodeMatch> = self
            .node_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| kind.is_none_or(|k| node.kind == k))
            .filter_map(|node| {
                let mut score = 0u32;
                if node.label.to_lowercase().contains(&needle) {
                    score += 3;
                }
                if node.description.to_lowercase().contains(&needle) {
                    score += 2;
                }
                if node.tags.iter().any(|t| t.to_lowercase().contains(&needle)) {
                    score += 1;
                }
                (score > 0).then(|| NodeMatch {
                    node: node.clone(),
                    score,
                })
            })
            .collect();

        // Stable sort: equal scores keep insertion order
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches.truncate(limit);
        matches
    }

    // ── Path finding ─────────────────────────────────────────────────────────

    /// Breadth-first search over undirected adjacency from `from` to `to`.
    ///
    /// Non-target nodes are marked visited globally at first discovery, so the
    /// result is one shortest-depth route per distinct discovery, O(V+E)
    /// rather than an exponential enumeration of simple paths. The target is never
    /// marked, so every predecessor that reaches it yields its own path.
    pub fn find_paths(&self, from: &str, to: &str, max_depth: usize) -> Result<Vec<GraphPath>> {
        if !self.nodes.contains_key(from) {
            return Err(MemoryError::node_not_found(from));
        }
        if !self.nodes.contains_key(to) {
            return Err(MemoryError::node_not_found(to));
        }

        if from == to {
            return Ok(vec![GraphPath {
                nodes: vec![from.to_string()],
                edges: Vec::new(),
            }]);
        }

        let mut paths = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([from.to_string()]);
        let mut queue: VecDeque<GraphPath> = VecDeque::from([GraphPath {
            nodes: vec![from.to_string()],
            edges: Vec::new(),
        }]);

        while let Some(path) = queue.pop_front() {
            if path.edges.len() >= max_depth {
                continue;
            }
            let current = match path.nodes.last() {
                Some(c) => c.clone(),
                None => continue,
            };

            let neighbors = match self.adjacency.get(&current) {
                Some(n) => n,
                None => continue,
            };
            for neighbor in neighbors {
                let edge = match self.edge_between(&current, neighbor) {
                    Some(e) => e.clone(),
                    None => continue,
                };

                if neighbor == to {
                    let mut found = path.clone();
                    found.nodes.push(neighbor.clone());
                    found.edges.push(edge);
                    paths.push(found);
                } else if !visited.contains(neighbor) {
                    visited.insert(neighbor.clone());
                    let mut next = path.clone();
                    next.nodes.push(neighbor.clone());
                    next.edges.push(edge);
                    queue.push_back(next);
                }
            }
        }

        Ok(paths)
    }

    // ── Bulk build ───────────────────────────────────────────────────────────

    /// Mirror memory entries into the graph.
    ///
    /// Each entry becomes a `memory-<id>` node (existing mirrors are left in
    /// place). Pairs of mirrored entries whose contents overlap above the
    /// configured threshold are linked `related_to`, as are entries overlapping
    /// a task goal, via `task-<id>` nodes created on demand.
    pub fn build_from_memories(
        &mut self,
        memories: &[MemoryEntry],
        tasks: &[TaskRef],
        similarity: &dyn Similarity,
    ) -> Result<BuildGraphResult> {
        let mut result = BuildGraphResult {
            nodes_created: 0,
            edges_created: 0,
        };

        // 1. One node per memory
        for memory in memories {
            if self.nodes.contains_key(&memory_node_id(&memory.id)) {
                continue;
            }
            self.add_node(mirror_node(memory))?;
            result.nodes_created += 1;
        }

        // 2. Link overlapping memory pairs
        for (i, a) in memories.iter().enumerate() {
            for b in memories.iter().skip(i + 1) {
                let score = similarity.score(&a.content, &b.content);
                if score <= self.config.mirror_similarity {
                    continue;
                }
                let from = memory_node_id(&a.id);
                let to = memory_node_id(&b.id);
                if self.edge_between(&from, &to).is_some() {
                    continue;
                }
                self.add_edge(&from, &to, EdgeKind::RelatedTo, "similar content", Some(score))?;
                result.edges_created += 1;
            }
        }

        // 3. Link memories to task goals
        for task in tasks {
            let task_node = format!("task-{}", task.id);
            if !self.nodes.contains_key(&task_node) {
                let mut node = KnowledgeNode::new(
                    &task_node,
                    node_label(&task.goal, &task.id),
                    NodeKind::Task,
                );
                node.description = task.goal.clone();
                self.add_node(node)?;
                result.nodes_created += 1;
            }
            for memory in memories {
                let score = similarity.score(&memory.content, &task.goal);
                if score < self.config.task_overlap {
                    continue;
                }
                let from = memory_node_id(&memory.id);
                if self.edge_between(&from, &task_node).is_some() {
                    continue;
                }
                self.add_edge(&from, &task_node, EdgeKind::RelatedTo, "goal overlap", Some(score))?;
                result.edges_created += 1;
            }
        }

        Ok(result)
    }

    // ── Stats ────────────────────────────────────────────────────────────────

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_kind: HashMap<String, usize> = HashMap::new();
        for node in self.nodes.values() {
            *nodes_by_kind.entry(node.kind.as_str().to_string()).or_default() += 1;
        }
        let mut edges_by_kind: HashMap<String, usize> = HashMap::new();
        for (_, _, kind) in &self.edge_order {
            *edges_by_kind.entry(kind.as_str().to_string()).or_default() += 1;
        }
        GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            nodes_by_kind,
            edges_by_kind,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    /// First stored edge connecting the pair, in either direction.
    fn edge_between(&self, a: &str, b: &str) -> Option<&KnowledgeEdge> {
        self.edge_order
            .iter()
            .find(|(from, to, _)| (from == a && to == b) || (from == b && to == a))
            .and_then(|key| self.edges.get(key))
    }

    /// Record the undirected neighbor pair, once per pair.
    fn link_adjacency(&mut self, a: &str, b: &str) {
        let forward = self.adjacency.entry(a.to_string()).or_default();
        if !forward.iter().any(|n| n == b) {
            forward.push(b.to_string());
        }
        let backward = self.adjacency.entry(b.to_string()).or_default();
        if !backward.iter().any(|n| n == a) {
            backward.push(a.to_string());
        }
    }
}

/// Graph node id mirroring a memory entry.
pub fn memory_node_id(memory_id: &str) -> String {
    format!("memory-{memory_id}")
}

/// Mirror node for a memory entry; relation edges are added separately.
pub(crate) fn mirror_node(memory: &MemoryEntry) -> KnowledgeNode {
    let mut node = KnowledgeNode::new(
        memory_node_id(&memory.id),
        node_label(&memory.content, &memory.id),
        mirror_kind(memory.kind),
    );
    node.description = memory.content.clone();
    node.tags = vec![memory.kind.as_str().to_string()];
    node.metadata = Some(serde_json::json!({ "memory_id": memory.id }));
    node
}

/// Node kind a memory entry mirrors to.
fn mirror_kind(kind: MemoryKind) -> NodeKind {
    match kind {
        MemoryKind::Message => NodeKind::Event,
        MemoryKind::Document => NodeKind::Resource,
        MemoryKind::Thought => NodeKind::Insight,
        MemoryKind::Fact | MemoryKind::Knowledge => NodeKind::Concept,
    }
}

/// Truncated content as a label, falling back to the id for empty content.
fn node_label(content: &str, id: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return id.to_string();
    }
    let end = trimmed
        .char_indices()
        .take_while(|(i, _)| *i < 80)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(trimmed.len());
    trimmed[..end].to_string()
}
