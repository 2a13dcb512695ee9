//! Decision evolution graph
//!
//! Typed directed edges between decisions, the reasoning-reference parser
//! that creates them, and graph expansion for retrieval.

mod expand;
mod reasoning;

pub use expand::{
    expand_with_graph, ScoredCandidate, SOURCE_PRIMARY, SOURCE_SUPERSEDES_CHAIN,
};
pub use reasoning::{parse_reasoning_references, ParsedReference};

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::error::{MemoryError, Result};

// ============================================================================
// RELATIONSHIP
// ============================================================================

/// Typed relationship between two decisions.
///
/// This enum is the single source of truth for legal relationship values;
/// the storage-level CHECK constraint lists the same six strings and a test
/// keeps them in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// New decision replaces an older one on the same topic
    Supersedes,
    /// Source narrows or improves the target
    Refines,
    /// Source disagrees with the target
    Contradicts,
    /// Source extends the target's idea
    BuildsOn,
    /// Source argues against part of the target
    Debates,
    /// Source merges multiple targets into one approach
    Synthesizes,
}

impl Relationship {
    /// All legal relationship values, in storage order.
    pub const ALL: [Relationship; 6] = [
        Relationship::Supersedes,
        Relationship::Refines,
        Relationship::Contradicts,
        Relationship::BuildsOn,
        Relationship::Debates,
        Relationship::Synthesizes,
    ];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Supersedes => "supersedes",
            Relationship::Refines => "refines",
            Relationship::Contradicts => "contradicts",
            Relationship::BuildsOn => "builds_on",
            Relationship::Debates => "debates",
            Relationship::Synthesizes => "synthesizes",
        }
    }

    /// Parse a storage string; anything outside the whitelist fails cleanly.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "supersedes" => Ok(Relationship::Supersedes),
            "refines" => Ok(Relationship::Refines),
            "contradicts" => Ok(Relationship::Contradicts),
            "builds_on" => Ok(Relationship::BuildsOn),
            "debates" => Ok(Relationship::Debates),
            "synthesizes" => Ok(Relationship::Synthesizes),
            other => Err(MemoryError::validation_field(
                format!("Illegal relationship: {other}"),
                "relationship",
                other,
            )),
        }
    }

    /// Graph rank assigned to neighbors reached over this edge type.
    pub fn graph_rank(&self) -> f64 {
        match self {
            Relationship::Supersedes => 0.8,
            Relationship::Refines => 0.70,
            Relationship::Contradicts => 0.60,
            Relationship::BuildsOn => 0.75,
            Relationship::Debates => 0.65,
            Relationship::Synthesizes => 0.70,
        }
    }

    /// Factor applied to the primary's similarity when it is inherited by a
    /// neighbor reached over this edge type.
    pub fn similarity_factor(&self) -> f32 {
        match self {
            Relationship::Supersedes => 0.9,
            Relationship::Refines => 0.85,
            Relationship::Contradicts => 0.80,
            Relationship::BuildsOn => 0.90,
            Relationship::Debates => 0.85,
            Relationship::Synthesizes => 0.88,
        }
    }

    /// Provenance label for a neighbor reached by following this edge from
    /// `from_id` (outgoing) or into it (incoming).
    pub fn source_label(&self, outgoing: bool) -> &'static str {
        match (self, outgoing) {
            (Relationship::Supersedes, true) => "supersedes",
            (Relationship::Supersedes, false) => "superseded_by",
            (Relationship::Refines, true) => "refines",
            (Relationship::Refines, false) => "refined_by",
            (Relationship::Contradicts, _) => "contradicts",
            (Relationship::BuildsOn, true) => "builds_on",
            (Relationship::BuildsOn, false) => "built_on_by",
            (Relationship::Debates, true) => "debates",
            (Relationship::Debates, false) => "debated_by",
            (Relationship::Synthesizes, true) => "synthesizes",
            (Relationship::Synthesizes, false) => "synthesized_by",
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Relationship {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        Relationship::parse(s)
    }
}

// ============================================================================
// EDGE PROVENANCE
// ============================================================================

/// Who created an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    /// A human, via explicit link management
    User,
    /// The model, via the writer or parsed reasoning
    #[default]
    Llm,
    /// The engine itself (reconciliation, migrations)
    System,
}

impl CreatedBy {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CreatedBy::User => "user",
            CreatedBy::Llm => "llm",
            CreatedBy::System => "system",
        }
    }

    /// Parse from storage; unknown creators default to `llm`.
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "user" => CreatedBy::User,
            "system" => CreatedBy::System,
            _ => CreatedBy::Llm,
        }
    }
}

// ============================================================================
// EDGE
// ============================================================================

/// A directed typed relation between two decisions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEdge {
    /// Storage-assigned edge id
    pub id: i64,
    /// Source decision id
    pub from_id: String,
    /// Target decision id
    pub to_id: String,
    /// Relationship type
    pub relationship: Relationship,
    /// Free-text reason for the edge
    pub reason: Option<String>,
    /// Who created the edge
    pub created_by: CreatedBy,
    /// Tri-valued approval: approved, pending, or unset (legacy/auto)
    pub approved_by_user: Option<bool>,
    /// Decision whose reasoning spawned this edge
    pub decision_id: Option<String>,
    /// Supporting evidence
    pub evidence: Option<String>,
    /// Creation time, milliseconds
    pub created_at: i64,
    /// Approval time, milliseconds
    pub approved_at: Option<i64>,
}

/// One end of an edge as seen from a decision in a recall chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRef {
    /// The chain decision this edge touches
    pub decision_id: String,
    /// The decision on the other end
    pub other_id: String,
    /// Free-text reason
    pub reason: Option<String>,
    /// Creation time, milliseconds
    pub created_at: i64,
}

// ============================================================================
// SEMANTIC EDGE CATEGORIZATION
// ============================================================================

/// Edges of a recall chain, categorized by type and direction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticEdges {
    /// Chain decisions refining others
    pub refines: Vec<EdgeRef>,
    /// Others refining chain decisions
    pub refined_by: Vec<EdgeRef>,
    /// Chain decisions contradicting others
    pub contradicts: Vec<EdgeRef>,
    /// Others contradicting chain decisions
    pub contradicted_by: Vec<EdgeRef>,
    /// Chain decisions building on others
    pub builds_on: Vec<EdgeRef>,
    /// Others building on chain decisions
    pub built_on_by: Vec<EdgeRef>,
    /// Chain decisions debating others
    pub debates: Vec<EdgeRef>,
    /// Others debating chain decisions
    pub debated_by: Vec<EdgeRef>,
    /// Chain decisions synthesizing others
    pub synthesizes: Vec<EdgeRef>,
    /// Others synthesizing chain decisions
    pub synthesized_by: Vec<EdgeRef>,
}

impl SemanticEdges {
    /// Total number of categorized edge references.
    pub fn count(&self) -> usize {
        self.refines.len()
            + self.refined_by.len()
            + self.contradicts.len()
            + self.contradicted_by.len()
            + self.builds_on.len()
            + self.built_on_by.len()
            + self.debates.len()
            + self.debated_by.len()
            + self.synthesizes.len()
            + self.synthesized_by.len()
    }

    /// Whether any edges were categorized.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Categorize edges relative to a set of chain ids.
///
/// An edge whose source is in the chain lands in the outgoing bucket; an
/// edge whose target is in the chain lands in the incoming bucket. An edge
/// with both ends in the chain appears in both. Supersede edges are not
/// categorized; the chain itself carries that relation.
pub fn categorize_edges(chain_ids: &[String], edges: &[DecisionEdge]) -> SemanticEdges {
    use std::collections::HashSet;

    let ids: HashSet<&str> = chain_ids.iter().map(String::as_str).collect();
    let mut out = SemanticEdges::default();

    for edge in edges {
        if edge.relationship == Relationship::Supersedes {
            continue;
        }
        if ids.contains(edge.from_id.as_str()) {
            let entry = EdgeRef {
                decision_id: edge.from_id.clone(),
                other_id: edge.to_id.clone(),
                reason: edge.reason.clone(),
                created_at: edge.created_at,
            };
            match edge.relationship {
                Relationship::Refines => out.refines.push(entry),
                Relationship::Contradicts => out.contradicts.push(entry),
                Relationship::BuildsOn => out.builds_on.push(entry),
                Relationship::Debates => out.debates.push(entry),
                Relationship::Synthesizes => out.synthesizes.push(entry),
                Relationship::Supersedes => unreachable!(),
            }
        }
        if ids.contains(edge.to_id.as_str()) {
            let entry = EdgeRef {
                decision_id: edge.to_id.clone(),
                other_id: edge.from_id.clone(),
                reason: edge.reason.clone(),
                created_at: edge.created_at,
            };
            match edge.relationship {
                Relationship::Refines => out.refined_by.push(entry),
                Relationship::Contradicts => out.contradicted_by.push(entry),
                Relationship::BuildsOn => out.built_on_by.push(entry),
                Relationship::Debates => out.debated_by.push(entry),
                Relationship::Synthesizes => out.synthesized_by.push(entry),
                Relationship::Supersedes => unreachable!(),
            }
        }
    }

    out
}

// ============================================================================
// RECALL RESULT
// ============================================================================

/// Result of `recall(topic)`: the supersede chain plus categorized edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallResult {
    /// Topic that matched (may differ from the query under fuzzy fallback)
    pub topic: String,
    /// Supersede chain, most recent first
    pub chain: Vec<Decision>,
    /// Categorized semantic edges touching the chain
    pub semantic_edges: SemanticEdges,
    /// Number of decisions in the chain
    pub chain_length: usize,
    /// Number of categorized edge references
    pub edge_count: usize,
    /// Whether the keyword-prefix fallback produced the match
    pub fuzzy_matched: bool,
}

// ============================================================================
// TESTS
// ============================================================================
