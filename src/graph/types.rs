//! Knowledge graph type definitions.
//!
//! Defines [`NodeKind`] and [`EdgeKind`] (the closed vocabularies), [`KnowledgeNode`]
//! and [`KnowledgeEdge`] (the stored records), patch structs for partial updates, and
//! [`GraphPath`] (a traversal result).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Categories a knowledge node can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Concept,
    Task,
    Event,
    Resource,
    Process,
    Entity,
    Metric,
    Decision,
    Insight,
    Agent,
    Project,
    Trend,
    Tool,
    Strategy,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Task => "task",
            Self::Event => "event",
            Self::Resource => "resource",
            Self::Process => "process",
            Self::Entity => "entity",
            Self::Metric => "metric",
            Self::Decision => "decision",
            Self::Insight => "insight",
            Self::Agent => "agent",
            Self::Project => "project",
            Self::Trend => "trend",
            Self::Tool => "tool",
            Self::Strategy => "strategy",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concept" => Ok(Self::Concept),
            "task" => Ok(Self::Task),
            "event" => Ok(Self::Event),
            "resource" => Ok(Self::Resource),
            "process" => Ok(Self::Process),
            "entity" => Ok(Self::Entity),
            "metric" => Ok(Self::Metric),
            "decision" => Ok(Self::Decision),
            "insight" => Ok(Self::Insight),
            "agent" => Ok(Self::Agent),
            "project" => Ok(Self::Project),
            "trend" => Ok(Self::Trend),
            "tool" => Ok(Self::Tool),
            "strategy" => Ok(Self::Strategy),
            _ => Err(format!("unknown node kind: {s}")),
        }
    }
}

/// Relationship categories between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    RelatedTo,
    DependsOn,
    Influences,
    Contains,
    Implements,
    ReliesOn,
    Contradicts,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelatedTo => "related_to",
            Self::DependsOn => "depends_on",
            Self::Influences => "influences",
            Self::Contains => "contains",
            Self::Implements => "implements",
            Self::ReliesOn => "relies_on",
            Self::Contradicts => "contradicts",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "related_to" => Ok(Self::RelatedTo),
            "depends_on" => Ok(Self::DependsOn),
            "influences" => Ok(Self::Influences),
            "contains" => Ok(Self::Contains),
            "implements" => Ok(Self::Implements),
            "relies_on" => Ok(Self::ReliesOn),
            "contradicts" => Ok(Self::Contradicts),
            _ => Err(format!("unknown edge kind: {s}")),
        }
    }
}

/// Edge direction filter for adjacency queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Edges whose `to` is the queried node.
    Incoming,
    /// Edges whose `from` is the queried node.
    Outgoing,
    /// Both of the above.
    Both,
}

/// A typed node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    /// Unique id for the node's lifetime. Caller-supplied (e.g. `"task-42"`).
    pub id: String,
    /// Short human-readable name. Must be non-empty.
    pub label: String,
    /// Node category.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Longer free-text description. May be empty.
    #[serde(default)]
    pub description: String,
    /// Lowercased classification tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Arbitrary JSON metadata (e.g. `{"memory_id": "..."}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl KnowledgeNode {
    /// Build a node with the given identity and empty description/tags/metadata.
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            description: String::new(),
            tags: Vec::new(),
            metadata: None,
            created_at: Utc::now(),
        }
    }
}

/// A directed, typed edge between two existing nodes.
///
/// Uniqueness is on the `(from, to, kind)` triple; the `id` is a handle for
/// logs and inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    /// UUID v7 handle, assigned at insert.
    pub id: String,
    /// Id of the source node.
    pub from: String,
    /// Id of the target node.
    pub to: String,
    /// Relationship category.
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Relationship label (e.g. `"blocks release"`).
    #[serde(default)]
    pub label: String,
    /// Optional weight in `[0.0, 1.0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Partial update for a node. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodePatch {
    pub label: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update for an edge. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgePatch {
    pub label: Option<String>,
    /// `Some(strength)` replaces the weight; validated against `[0.0, 1.0]`.
    pub strength: Option<f64>,
}

/// One route between two nodes, as returned by path finding.
#[derive(Debug, Clone, Serialize)]
pub struct GraphPath {
    /// Node ids in traversal order, starting node first. Always `edges.len() + 1` long.
    pub nodes: Vec<String>,
    /// Edges crossed, in traversal order. Direction is the stored edge's, which
    /// may oppose travel direction (adjacency is undirected).
    pub edges: Vec<KnowledgeEdge>,
}

/// A scored match from [`crate::graph::GraphStore::find_nodes`].
#[derive(Debug, Clone, Serialize)]
pub struct NodeMatch {
    pub node: KnowledgeNode,
    /// Field-weighted match score (label 3, description 2, tags 1).
    pub score: u32,
}

/// Aggregate counts for the graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Node counts keyed by kind string.
    pub nodes_by_kind: HashMap<String, usize>,
    /// Edge counts keyed by kind string.
    pub edges_by_kind: HashMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn node_kind_round_trips_through_str() {
        for kind in [
            NodeKind::Concept,
            NodeKind::Task,
            NodeKind::Metric,
            NodeKind::Strategy,
        ] {
            assert_eq!(NodeKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(NodeKind::from_str("widget").is_err());
    }

    #[test]
    fn edge_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EdgeKind::DependsOn).unwrap();
        assert_eq!(json, "\"depends_on\"");
        assert_eq!(EdgeKind::from_str("relies_on").unwrap(), EdgeKind::ReliesOn);
    }

    #[test]
    fn node_serializes_kind_under_type_key() {
        let node = KnowledgeNode::new("n1", "Quarterly revenue", NodeKind::Metric);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "metric");
        assert_eq!(json["label"], "Quarterly revenue");
    }
}
