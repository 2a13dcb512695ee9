//! Retrieval: vector similarity, recency re-scoring, relevance ranking
//!
//! The HNSW index lives behind the `vector-search` feature; recency and
//! relevance math are always available (the keyword fallback path uses them
//! too).

mod recency;
mod relevance;

#[cfg(feature = "vector-search")]
mod vector;

pub use recency::{final_score, recency_score, RecencyConfig};
pub use relevance::{
    cosine_similarity, rank_by_relevance, RankedDecision, DEFAULT_CONTEXT_LIMIT, RELEVANCE_FLOOR,
};

#[cfg(feature = "vector-search")]
pub use vector::{VectorIndex, VectorSearchError};

use serde::{Deserialize, Serialize};

use crate::decision::Decision;

// ============================================================================
// ADAPTIVE THRESHOLD
// ============================================================================

/// Similarity threshold for short queries (fewer than 3 tokens)
pub const SHORT_QUERY_THRESHOLD: f32 = 0.70;

/// Similarity threshold for longer queries
pub const LONG_QUERY_THRESHOLD: f32 = 0.60;

/// Flat similarity assigned to keyword-fallback matches
pub const KEYWORD_FALLBACK_SIMILARITY: f32 = 0.75;

/// Candidate over-fetch factor before threshold filtering
pub const CANDIDATE_MULTIPLIER: usize = 3;

/// Pick the similarity threshold from query length.
///
/// Short queries produce noisier embeddings, so the bar is higher.
pub fn adaptive_threshold(query: &str) -> f32 {
    if query.split_whitespace().count() < 3 {
        SHORT_QUERY_THRESHOLD
    } else {
        LONG_QUERY_THRESHOLD
    }
}

// ============================================================================
// SUGGEST OPTIONS
// ============================================================================

/// Default number of primary results returned by `suggest`
pub const DEFAULT_SUGGEST_LIMIT: usize = 5;

/// Options for `suggest`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuggestOptions {
    /// Maximum primary results (default 5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Similarity threshold override (default adaptive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    /// Recency weight override (default 0.3; 0 disables recency)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recency_weight: Option<f64>,
    /// Days until the recency score reaches `recency_decay` (default 7)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recency_scale_days: Option<f64>,
    /// Recency score at `recency_scale_days` (default 0.5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recency_decay: Option<f64>,
    /// Disable recency re-scoring entirely
    #[serde(default)]
    pub disable_recency: bool,
    /// Expand results across the evolution graph and interleave (default on)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_reranking: Option<bool>,
}

impl SuggestOptions {
    /// Effective recency configuration for these options.
    pub fn recency_config(&self) -> RecencyConfig {
        let mut config = RecencyConfig::default();
        if let Some(weight) = self.recency_weight {
            config.weight = weight.clamp(0.0, 1.0);
        }
        if let Some(scale) = self.recency_scale_days {
            if scale > 0.0 {
                config.scale_days = scale;
            }
        }
        if let Some(decay) = self.recency_decay {
            if decay > 0.0 && decay < 1.0 {
                config.decay = decay;
            }
        }
        if self.disable_recency {
            config.weight = 0.0;
        }
        config
    }

    /// Whether graph expansion should run.
    pub fn reranking_enabled(&self) -> bool {
        self.use_reranking.unwrap_or(true)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// How a suggest query was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// HNSW similarity over stored embeddings
    Vector,
    /// Tokenized LIKE fallback over topic and decision text
    Keyword,
}

impl SearchMethod {
    /// Provenance label, `+graph` appended when expansion ran.
    pub fn label(&self, expanded: bool) -> String {
        let base = match self {
            SearchMethod::Vector => "vector",
            SearchMethod::Keyword => "keyword",
        };
        if expanded {
            format!("{base}+graph")
        } else {
            base.to_string()
        }
    }
}

/// A ranked retrieval result with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// The decision
    pub decision: Decision,
    /// Similarity to the query (inherited and scaled for graph neighbors)
    pub similarity: f32,
    /// Gaussian recency score in [0, 1]
    pub recency_score: f64,
    /// Age in days at query time
    pub recency_age_days: f64,
    /// Final mixed score used for ordering primaries
    pub final_score: f64,
    /// How the entry entered the result set (`primary`, `supersedes_chain`,
    /// or an edge-type label)
    pub graph_source: String,
    /// Rank weight of the graph source
    pub graph_rank: f64,
    /// Primary this entry expands, when not itself primary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_to: Option<String>,
    /// Reason carried by the connecting edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_reason: Option<String>,
}

/// Response of `suggest`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResponse {
    /// Interleaved results, primaries first within each group
    pub results: Vec<Suggestion>,
    /// `vector`, `keyword`, `vector+graph`, or `keyword+graph`
    pub search_method: String,
}

// ============================================================================
// TESTS
// ============================================================================
