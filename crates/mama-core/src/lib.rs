//! # MAMA Core
//!
//! Embedded decision memory engine. Captures immutable records of technical
//! decisions, links them into a typed evolution graph, embeds their text
//! into a dense vector space, and answers similarity + graph-expanded
//! queries:
//!
//! - **Supersede chains**: one current decision per topic, with the full
//!   history walkable newest-first
//! - **Typed evolution graph**: refines / contradicts / builds_on / debates /
//!   synthesizes edges, parsed out of reasoning text or proposed explicitly
//! - **Semantic retrieval**: local fastembed embeddings, USearch HNSW index,
//!   Gaussian recency re-scoring, graph-expanded interleaved results
//! - **Outcome tracking**: heuristic feedback classification with confidence
//!   evolution
//! - **Tier degradation**: keyword-only retrieval when vector search is
//!   unavailable, embeddings-disabled mode for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mama_core::{MamaConfig, MemoryEngine, SaveInput, SuggestOptions};
//!
//! let engine = MemoryEngine::new(MamaConfig::load());
//! engine.init().await?;
//!
//! let report = engine
//!     .save(SaveInput::new("auth_strategy", "JWT", "stateless scaling").with_confidence(0.7))
//!     .await?;
//!
//! let chain = engine.recall("auth_strategy").await?;
//! let hits = engine.suggest("authentication", SuggestOptions::default()).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local embedding generation with fastembed
//! - `vector-search` (default): HNSW vector search with USearch
//! - `bundled-sqlite` (default): compile SQLite into the binary
//! - `full`: embeddings + vector-search

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod decision;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod graph;
pub mod outcome;
pub mod search;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Engine & lifecycle
pub use engine::{
    ContextInjection, EngineStats, MemoryEngine, RetrievalTier, INJECTION_BUDGET_MS,
};

// Configuration
pub use config::{MamaConfig, DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_NAME};

// Errors
pub use error::{MemoryError, Result};

// Domain model
pub use decision::{
    Decision, Outcome, OutcomeUpdate, ReasoningGraph, SaveInput, SaveReport, SimilarDecision,
};

// Graph
pub use graph::{
    CreatedBy, DecisionEdge, EdgeRef, RecallResult, Relationship, SemanticEdges,
};

// Retrieval
pub use search::{
    RecencyConfig, SearchMethod, SuggestOptions, SuggestResponse, Suggestion,
};

// Embedding cache stats
pub use embeddings::CacheStats;

// Outcome tracking
pub use outcome::{OutcomeFeedback, OutcomeTracker};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current time in milliseconds since epoch. Every persisted timestamp in
/// the engine goes through this.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Decision, MamaConfig, MemoryEngine, MemoryError, Outcome, OutcomeUpdate, RecallResult,
        Relationship, Result, SaveInput, SaveReport, SuggestOptions, SuggestResponse,
    };
}
