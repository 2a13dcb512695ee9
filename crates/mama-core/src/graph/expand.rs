//! Graph expansion for retrieval
//!
//! Takes the primary candidates from vector or keyword search and pulls in
//! their supersede chains and typed-edge neighbors, each tagged with
//! provenance. Output is interleaved: primaries in score order, each
//! immediately followed by its related entries in graph-rank order.

use std::collections::HashSet;

use crate::decision::Decision;
use crate::error::Result;
use crate::graph::Relationship;
use crate::search::{recency_score, RecencyConfig, Suggestion};
use crate::storage::DecisionStore;

/// Provenance label for primary results
pub const SOURCE_PRIMARY: &str = "primary";

/// Provenance label for supersede-chain results
pub const SOURCE_SUPERSEDES_CHAIN: &str = "supersedes_chain";

/// Graph rank of supersede-chain entries
const CHAIN_GRAPH_RANK: f64 = 0.8;

/// Similarity scaling for supersede-chain entries
const CHAIN_SIMILARITY_FACTOR: f32 = 0.9;

/// A scored primary candidate entering graph expansion
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// The decision
    pub decision: Decision,
    /// Similarity to the query
    pub similarity: f32,
    /// Gaussian recency score
    pub recency_score: f64,
    /// Age in days at query time
    pub recency_age_days: f64,
    /// Final mixed ordering score
    pub final_score: f64,
}

impl ScoredCandidate {
    pub(crate) fn into_primary(self) -> Suggestion {
        Suggestion {
            decision: self.decision,
            similarity: self.similarity,
            recency_score: self.recency_score,
            recency_age_days: self.recency_age_days,
            final_score: self.final_score,
            graph_source: SOURCE_PRIMARY.to_string(),
            graph_rank: 1.0,
            related_to: None,
            edge_reason: None,
        }
    }
}

fn related_entry(
    decision: Decision,
    parent: &ScoredCandidate,
    graph_source: String,
    graph_rank: f64,
    similarity_factor: f32,
    edge_reason: Option<String>,
    now_ms: i64,
    recency: &RecencyConfig,
) -> Suggestion {
    let age_days = decision.age_days(now_ms);
    Suggestion {
        decision,
        similarity: parent.similarity * similarity_factor,
        recency_score: recency_score(age_days, recency.scale_days, recency.decay),
        recency_age_days: age_days,
        final_score: parent.final_score * similarity_factor as f64,
        graph_source,
        graph_rank,
        related_to: Some(parent.decision.id.clone()),
        edge_reason,
    }
}

/// Expand primaries across the evolution graph and interleave.
///
/// Duplicates are removed by id with first write winning: primaries claim
/// their ids first (in score order), then each primary's chain and
/// neighbors. Per-candidate storage errors are logged and skipped so one
/// bad row cannot fail the whole query.
pub fn expand_with_graph(
    store: &DecisionStore,
    primaries: Vec<ScoredCandidate>,
    now_ms: i64,
    recency: &RecencyConfig,
) -> Result<Vec<Suggestion>> {
    // Dedup primaries, then order by (final_score, similarity), id as the
    // deterministic tie-break
    let mut seen: HashSet<String> = HashSet::new();
    let mut ordered: Vec<ScoredCandidate> = Vec::with_capacity(primaries.len());
    for candidate in primaries {
        if seen.insert(candidate.decision.id.clone()) {
            ordered.push(candidate);
        }
    }
    ordered.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then_with(|| a.decision.id.cmp(&b.decision.id))
    });

    let mut output = Vec::new();
    for candidate in ordered {
        let primary_id = candidate.decision.id.clone();
        let mut related: Vec<Suggestion> = Vec::new();

        // Supersede chain, minus the primary itself
        match store.full_chain(&primary_id) {
            Ok(chain) => {
                for decision in chain {
                    if decision.id == primary_id || !seen.insert(decision.id.clone()) {
                        continue;
                    }
                    related.push(related_entry(
                        decision,
                        &candidate,
                        SOURCE_SUPERSEDES_CHAIN.to_string(),
                        CHAIN_GRAPH_RANK,
                        CHAIN_SIMILARITY_FACTOR,
                        None,
                        now_ms,
                        recency,
                    ));
                }
            }
            Err(e) => tracing::warn!("Chain expansion failed for {}: {}", primary_id, e),
        }

        // Typed-edge neighbors, both directions
        match store.edges_touching(&primary_id) {
            Ok(edges) => {
                for edge in edges {
                    if edge.relationship == Relationship::Supersedes {
                        continue;
                    }
                    let outgoing = edge.from_id == primary_id;
                    let neighbor_id = if outgoing { &edge.to_id } else { &edge.from_id };
                    if !seen.insert(neighbor_id.clone()) {
                        continue;
                    }
                    match store.get(neighbor_id) {
                        Ok(Some(neighbor)) => {
                            related.push(related_entry(
                                neighbor,
                                &candidate,
                                edge.relationship.source_label(outgoing).to_string(),
                                edge.relationship.graph_rank(),
                                edge.relationship.similarity_factor(),
                                edge.reason.clone(),
                                now_ms,
                                recency,
                            ));
                        }
                        Ok(None) => {
                            tracing::warn!("Edge references missing decision {}", neighbor_id)
                        }
                        Err(e) => {
                            tracing::warn!("Failed to load neighbor {}: {}", neighbor_id, e)
                        }
                    }
                }
            }
            Err(e) => tracing::warn!("Edge expansion failed for {}: {}", primary_id, e),
        }

        related.sort_by(|a, b| {
            b.graph_rank
                .partial_cmp(&a.graph_rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.final_score
                        .partial_cmp(&a.final_score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then_with(|| a.decision.id.cmp(&b.decision.id))
        });

        output.push(candidate.into_primary());
        output.append(&mut related);
    }

    Ok(output)
}

// ============================================================================
// TESTS
// ============================================================================
