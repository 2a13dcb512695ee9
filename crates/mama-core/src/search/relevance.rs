//! Relevance scoring for context injection
//!
//! Picks the handful of decisions worth putting in front of the model:
//! `relevance = 0.2·recency + 0.5·importance + 0.3·semantic`. Failures are
//! weighted highest; a failed decision the user is about to repeat is worth
//! more context budget than a success.

use serde::{Deserialize, Serialize};

use crate::decision::{Decision, Outcome};

/// Minimum relevance for a decision to be included in context
pub const RELEVANCE_FLOOR: f64 = 0.5;

/// Default number of decisions selected for context
pub const DEFAULT_CONTEXT_LIMIT: usize = 3;

/// Recency half-life in days for context selection
const RECENCY_HALF_LIFE_DAYS: f64 = 30.0;

const RECENCY_WEIGHT: f64 = 0.2;
const IMPORTANCE_WEIGHT: f64 = 0.5;
const SEMANTIC_WEIGHT: f64 = 0.3;

/// A decision with its relevance breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedDecision {
    /// The decision
    pub decision: Decision,
    /// Combined relevance score
    pub relevance: f64,
    /// Recency component
    pub recency: f64,
    /// Outcome-importance component
    pub importance: f64,
    /// Cosine-similarity component (0 when either vector is missing)
    pub semantic: f64,
}

/// Compute cosine similarity between two vectors.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 {
        dot_product / denominator
    } else {
        0.0
    }
}

/// Rank decisions by relevance and keep the top `limit` above the floor.
///
/// Each candidate optionally carries its stored embedding; the semantic
/// component is zero when the query vector or the candidate vector is
/// missing.
pub fn rank_by_relevance(
    query_vec: Option<&[f32]>,
    candidates: Vec<(Decision, Option<Vec<f32>>)>,
    now_ms: i64,
    limit: usize,
) -> Vec<RankedDecision> {
    let mut ranked: Vec<RankedDecision> = candidates
        .into_iter()
        .map(|(decision, vector)| {
            let recency = (-decision.age_days(now_ms) / RECENCY_HALF_LIFE_DAYS).exp();
            let importance = Outcome::importance(decision.outcome);
            let semantic = match (query_vec, vector.as_deref()) {
                (Some(q), Some(v)) => cosine_similarity(q, v) as f64,
                _ => 0.0,
            };
            let relevance = RECENCY_WEIGHT * recency
                + IMPORTANCE_WEIGHT * importance
                + SEMANTIC_WEIGHT * semantic;
            RankedDecision {
                decision,
                relevance,
                recency,
                importance,
                semantic,
            }
        })
        .filter(|r| r.relevance >= RELEVANCE_FLOOR)
        .collect();

    ranked.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.decision.id.cmp(&b.decision.id))
    });
    ranked.truncate(limit);
    ranked
}
