pub mod store;
pub mod types;

pub use store::{memory_node_id, BuildGraphResult, GraphStore, TaskRef};
pub use types::{
    Direction, EdgeKind, EdgePatch, GraphPath, GraphStats, KnowledgeEdge, KnowledgeNode,
    NodeKind, NodeMatch, NodePatch,
};
