//! Error types for the memory engine.

use thiserror::Error;

/// Result type alias using the engine's [`MemoryError`].
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors surfaced by graph and memory operations.
///
/// Structural mutations validate before touching state, so a returned error
/// means nothing was applied. `Uninitialized` is the only retryable variant:
/// call [`crate::engine::MemoryEngine::load`] and try again.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Input rejected before any mutation (empty label, out-of-range strength, empty content).
    #[error("validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Referenced node, edge, or memory does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// A node with this id already exists.
    #[error("node already exists: {id}")]
    DuplicateNode { id: String },

    /// An edge with this exact (from, to, kind) triple already exists.
    #[error("edge already exists: {from} -[{kind}]-> {to}")]
    DuplicateEdge {
        from: String,
        to: String,
        kind: String,
    },

    /// Engine used before `load()` completed. Retryable.
    #[error("memory engine not initialized; call load() first")]
    Uninitialized,

    /// A consolidation group failed to merge. Recorded per group; the pass continues.
    #[error("consolidation failed for group [{group}]: {reason}")]
    Consolidation { group: String, reason: String },

    /// Opaque failure from a collaborator (backend or semantic index).
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl MemoryError {
    /// Create a validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error for a node.
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "node".into(),
            id: id.into(),
        }
    }

    /// Create a not-found error for an edge.
    pub fn edge_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "edge".into(),
            id: id.into(),
        }
    }

    /// Create a not-found error for a memory entry.
    pub fn memory_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "memory".into(),
            id: id.into(),
        }
    }

    /// Create a per-group consolidation error.
    pub fn consolidation(group_ids: &[String], reason: impl Into<String>) -> Self {
        Self::Consolidation {
            group: group_ids.join(", "),
            reason: reason.into(),
        }
    }

    /// `true` for errors the caller may retry after fixing engine state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Uninitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifiers() {
        let err = MemoryError::node_not_found("node-42");
        assert_eq!(err.to_string(), "node not found: node-42");

        let err = MemoryError::DuplicateEdge {
            from: "a".into(),
            to: "b".into(),
            kind: "depends_on".into(),
        };
        assert!(err.to_string().contains("a -[depends_on]-> b"));
    }

    #[test]
    fn only_uninitialized_is_retryable() {
        assert!(MemoryError::Uninitialized.is_retryable());
        assert!(!MemoryError::validation("label", "empty").is_retryable());
        assert!(!MemoryError::node_not_found("x").is_retryable());
    }
}
