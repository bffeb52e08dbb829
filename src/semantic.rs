//! Semantic-search collaborator boundary.
//!
//! The engine never computes embeddings or vector similarity itself; it hands
//! query text to a [`SemanticIndex`] and gets back ranked candidate ids. Any
//! vector store, embedding service, or test double can sit behind the trait.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A ranked candidate returned by the index.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticHit {
    /// Memory entry id.
    pub id: String,
    /// Similarity in `[0.0, 1.0]`, higher is closer.
    pub score: f64,
}

/// Opaque ranked-candidate source.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Top candidates for a query, best first. Scores are the collaborator's
    /// own similarity measure in `[0.0, 1.0]`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SemanticHit>>;
}

/// Index that returns no candidates.
///
/// Running the engine against this yields pure keyword retrieval, for
/// embedded deployments without an embedding service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIndex;

#[async_trait]
impl SemanticIndex for NullIndex {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SemanticHit>> {
        Ok(Vec::new())
    }
}
