mod helpers;

use std::sync::Arc;

use helpers::{fact, seeded_engine};
use mnemo::error::MemoryError;
use mnemo::graph::{
    memory_node_id, Direction, EdgeKind, EdgePatch, KnowledgeNode, NodeKind, NodePatch, TaskRef,
};
use mnemo::semantic::NullIndex;

async fn empty_engine() -> mnemo::engine::MemoryEngine {
    seeded_engine(Vec::new(), Arc::new(NullIndex)).await
}

fn node(id: &str, label: &str, kind: NodeKind) -> KnowledgeNode {
    KnowledgeNode::new(id, label, kind)
}

#[tokio::test]
async fn node_round_trip_and_delete() {
    let mut engine = empty_engine().await;
    let mut original = node("db", "primary database", NodeKind::Resource);
    original.description = "postgres 16 primary".to_string();
    original.tags = vec!["infra".to_string()];

    engine.add_node(original.clone()).unwrap();
    let fetched = engine.get_node("db").unwrap().unwrap();
    assert_eq!(fetched, original);

    engine.delete_node("db").unwrap();
    assert!(engine.get_node("db").unwrap().is_none());
}

#[tokio::test]
async fn duplicate_node_rejected_without_side_effects() {
    let mut engine = empty_engine().await;
    engine
        .add_node(node("svc", "billing service", NodeKind::Process))
        .unwrap();

    let err = engine
        .add_node(node("svc", "imposter", NodeKind::Agent))
        .unwrap_err();
    assert!(matches!(err, MemoryError::DuplicateNode { .. }));

    // The original is untouched
    let kept = engine.get_node("svc").unwrap().unwrap();
    assert_eq!(kept.label, "billing service");
    assert_eq!(kept.kind, NodeKind::Process);
}

#[tokio::test]
async fn deleting_a_node_cascades_its_edges() {
    let mut engine = empty_engine().await;
    for (id, label) in [("a", "alpha"), ("b", "bridge"), ("c", "gamma")] {
        engine.add_node(node(id, label, NodeKind::Concept)).unwrap();
    }
    engine
        .add_edge("a", "b", EdgeKind::RelatedTo, "pair", None)
        .unwrap();
    engine
        .add_edge("b", "c", EdgeKind::DependsOn, "link", None)
        .unwrap();

    let removed = engine.delete_node("b").unwrap();
    assert_eq!(removed, 2);
    assert!(engine.get_edges("a", Direction::Both).unwrap().is_empty());
    assert!(engine.get_edges("c", Direction::Both).unwrap().is_empty());

    // Paths through the deleted node are gone
    let err = engine.find_paths("a", "b", 3).unwrap_err();
    assert!(matches!(err, MemoryError::NotFound { .. }));
}

#[tokio::test]
async fn single_edge_yields_exactly_one_path() {
    let mut engine = empty_engine().await;
    engine.add_node(node("a", "alpha", NodeKind::Concept)).unwrap();
    engine.add_node(node("b", "beta", NodeKind::Concept)).unwrap();
    engine
        .add_edge("a", "b", EdgeKind::Influences, "push", Some(0.8))
        .unwrap();

    let paths = engine.find_paths("a", "b", 2).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].nodes, vec!["a", "b"]);
    assert_eq!(paths[0].edges.len(), 1);
    assert_eq!(paths[0].edges[0].kind, EdgeKind::Influences);
}

#[tokio::test]
async fn paths_traverse_against_edge_direction() {
    let mut engine = empty_engine().await;
    engine.add_node(node("a", "alpha", NodeKind::Concept)).unwrap();
    engine.add_node(node("b", "beta", NodeKind::Concept)).unwrap();
    engine.add_node(node("c", "gamma", NodeKind::Concept)).unwrap();
    // Both edges point away from b; adjacency is undirected
    engine
        .add_edge("b", "a", EdgeKind::RelatedTo, "rev", None)
        .unwrap();
    engine
        .add_edge("b", "c", EdgeKind::RelatedTo, "fwd", None)
        .unwrap();

    let paths = engine.find_paths("a", "c", 2).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].nodes, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn patches_update_nodes_and_edges() {
    let mut engine = empty_engine().await;
    engine
        .add_node(node("plan", "rollout plan", NodeKind::Strategy))
        .unwrap();
    engine
        .add_node(node("kpi", "activation rate", NodeKind::Metric))
        .unwrap();
    engine
        .add_edge("plan", "kpi", EdgeKind::Influences, "targets", Some(0.4))
        .unwrap();

    let updated = engine
        .update_node(
            "plan",
            NodePatch {
                description: Some("rollout plan for q3".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.description, "rollout plan for q3");
    assert_eq!(updated.label, "rollout plan");

    let edge = engine
        .update_edge(
            "plan",
            "kpi",
            EdgeKind::Influences,
            EdgePatch {
                strength: Some(0.9),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(edge.strength, Some(0.9));

    engine
        .delete_edge("plan", "kpi", EdgeKind::Influences)
        .unwrap();
    assert!(engine.get_edges("kpi", Direction::Incoming).unwrap().is_empty());
}

#[tokio::test]
async fn find_nodes_ranks_label_over_description_over_tags() {
    let mut engine = empty_engine().await;
    let mut tagged = node("n1", "release steps", NodeKind::Process);
    tagged.tags = vec!["deploy".to_string()];
    let mut described = node("n2", "ship checklist", NodeKind::Process);
    described.description = "deploy procedure".to_string();
    let labeled = node("n3", "deploy pipeline", NodeKind::Process);

    engine.add_node(tagged).unwrap();
    engine.add_node(described).unwrap();
    engine.add_node(labeled).unwrap();

    let matches = engine.find_nodes("deploy", None, None).unwrap();
    let ids: Vec<&str> = matches.iter().map(|m| m.node.id.as_str()).collect();
    assert_eq!(ids, vec!["n3", "n2", "n1"]);
}

#[tokio::test]
async fn build_graph_mirrors_memories_and_links_tasks() {
    let entries = vec![
        fact("m1", "beta launch checklist for the mobile app"),
        fact("m2", "beta launch checklist for the web app"),
        fact("m3", "espresso machine descaling instructions"),
    ];
    let mut engine = seeded_engine(entries, Arc::new(NullIndex)).await;

    let tasks = vec![TaskRef {
        id: "t1".to_string(),
        goal: "ship the beta launch".to_string(),
    }];
    let result = engine.build_graph(&tasks).unwrap();
    assert_eq!(result.nodes_created, 4);
    assert!(result.edges_created >= 2);

    // Mirror nodes carry the memory content
    let mirror = engine.get_node(&memory_node_id("m1")).unwrap().unwrap();
    assert_eq!(mirror.kind, NodeKind::Concept);
    assert!(mirror.description.contains("beta launch"));

    // Similar memories are linked; the unrelated one is not
    assert!(!engine
        .get_edges(&memory_node_id("m1"), Direction::Both)
        .unwrap()
        .is_empty());
    let task_edges = engine.get_edges("task-t1", Direction::Both).unwrap();
    assert_eq!(task_edges.len(), 2);
    assert!(engine
        .get_edges(&memory_node_id("m3"), Direction::Both)
        .unwrap()
        .is_empty());

    // Rebuilding is idempotent
    let again = engine.build_graph(&tasks).unwrap();
    assert_eq!(again.nodes_created, 0);
    assert_eq!(again.edges_created, 0);

    let stats = engine.graph_stats().unwrap();
    assert_eq!(stats.node_count, 4);
    assert_eq!(stats.nodes_by_kind.get("task"), Some(&1));
}

#[tokio::test]
async fn graph_mutations_land_in_the_journal() {
    let mut engine = empty_engine().await;
    engine
        .add_node(node("a", "alpha", NodeKind::Concept))
        .unwrap();
    engine
        .add_node(node("b", "beta", NodeKind::Concept))
        .unwrap();
    engine
        .add_edge("a", "b", EdgeKind::RelatedTo, "pair", None)
        .unwrap();

    let activity = engine.recent_activity(10).unwrap();
    let operations: Vec<&str> = activity.iter().map(|e| e.operation.as_str()).collect();
    assert_eq!(operations, vec!["add_edge", "add_node", "add_node"]);
}
