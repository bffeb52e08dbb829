//! Knowledge graph and memory relevance engine for AI agents.
//!
//! mnemo keeps an agent's long-lived knowledge in two connected shapes: a
//! typed knowledge graph of nodes and directed edges, and a store of scored
//! memory entries whose relevance rises with use and sinks with neglect.
//! Memories come in five kinds, each with its own decay behavior:
//!
//! | Kind | Purpose | Decay multiplier |
//! |------|---------|------------------|
//! | **Message** | Conversation turns | Fast (×2.5) |
//! | **Thought** | Working notes, hypotheses | Elevated (×1.5) |
//! | **Fact** | Checked statements | Slow (×0.7) |
//! | **Knowledge** | Consolidated understanding | Slowest (×0.4) |
//! | **Document** | Source material | Never decays |
//!
//! # Architecture
//!
//! - **Graph**: in-memory adjacency with typed nodes and edges, weighted
//!   substring search, and breadth-first path finding
//! - **Retrieval**: hybrid semantic + keyword scoring; the semantic channel
//!   lives behind the [`semantic::SemanticIndex`] trait and search degrades to
//!   keyword-only when it fails
//! - **Lifecycle**: access-aware decay, similarity-driven consolidation, and
//!   conjunctive-rule pruning, run as externally scheduled passes
//! - **Persistence**: pluggable [`backend::MemoryBackend`]; the engine's map
//!   is a cache above it
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`engine`]: the per-agent [`engine::MemoryEngine`] context object
//! - [`graph`]: knowledge graph store with node/edge CRUD, search, and paths
//! - [`memory`]: relevance scoring, decay, consolidation, expansion, threads
//! - [`backend`], [`semantic`]: collaborator traits with in-process reference impls
//! - [`journal`]: bounded audit ring of engine mutations

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod journal;
pub mod memory;
pub mod semantic;
