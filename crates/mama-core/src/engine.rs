//! Memory engine
//!
//! The explicit engine value owning the store, embedding pipeline, and
//! cache. Construct one (or use [`MemoryEngine::global`]), call `init()`
//! once, then use the async surface. Initialization is single-flight:
//! concurrent callers share one bootstrap, a failed bootstrap clears all
//! partial state so a later call can retry.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::MamaConfig;
use crate::decision::{
    generate_decision_id, CreatedEdge, Decision, Outcome, OutcomeUpdate, ReasoningGraph,
    SaveInput, SaveReport, SimilarDecision,
};
use crate::embeddings::{
    CacheStats, EmbeddingCache, EmbeddingError, EmbeddingPipeline, DEFAULT_CACHE_CAPACITY,
};
use crate::error::{MemoryError, Result};
use crate::graph::{
    categorize_edges, expand_with_graph, parse_reasoning_references, CreatedBy, DecisionEdge,
    RecallResult, Relationship, ScoredCandidate,
};
use crate::outcome::{OutcomeFeedback, OutcomeTracker};
use crate::search::{
    adaptive_threshold, final_score, rank_by_relevance, recency_score, RankedDecision,
    SearchMethod, SuggestOptions, SuggestResponse, CANDIDATE_MULTIPLIER, DEFAULT_CONTEXT_LIMIT,
    DEFAULT_SUGGEST_LIMIT, KEYWORD_FALLBACK_SIMILARITY,
};
use crate::storage::{DecisionStore, NewEdge};

/// End-to-end budget for the context-injection path
pub const INJECTION_BUDGET_MS: u64 = 5_000;

/// How many recent decisions relevance scoring considers
const CONTEXT_CANDIDATE_POOL: usize = 50;

/// Similarity floor for the save-path similar-decision advisory
const SIMILAR_DECISION_THRESHOLD: f32 = 0.6;

/// How many similar decisions the save path reports
const SIMILAR_DECISION_LIMIT: usize = 3;

// ============================================================================
// TIER & STATS
// ============================================================================

/// Retrieval capability tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalTier {
    /// Full vector + graph retrieval
    Tier1,
    /// Keyword-only retrieval (vector search unavailable)
    Tier2,
    /// Embeddings disabled entirely (testing mode)
    Tier3,
}

impl std::fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalTier::Tier1 => write!(f, "tier1"),
            RetrievalTier::Tier2 => write!(f, "tier2"),
            RetrievalTier::Tier3 => write!(f, "tier3"),
        }
    }
}

/// Engine statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// All decisions
    pub total_decisions: i64,
    /// Decisions with no successor
    pub active_decisions: i64,
    /// All edges
    pub total_edges: i64,
    /// Edges awaiting approval
    pub pending_links: i64,
    /// Decisions with a stored vector
    pub embeddings_stored: i64,
    /// Edge counts per relationship type
    pub edges_by_type: BTreeMap<String, i64>,
    /// Current retrieval tier
    pub tier: RetrievalTier,
    /// Whether vector similarity queries can be served
    pub vector_search_enabled: bool,
    /// Embedding cache statistics
    pub cache: CacheStats,
}

/// Context selected for injection, with the relevance breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInjection {
    /// Selected decisions, most relevant first
    pub decisions: Vec<RankedDecision>,
    /// Wall time spent assembling the context
    pub elapsed_ms: u64,
}

// ============================================================================
// ENGINE STATE
// ============================================================================

/// Everything behind a successful `init()`
struct EngineState {
    store: DecisionStore,
    pipeline: EmbeddingPipeline,
    cache: EmbeddingCache,
}

impl EngineState {
    fn bootstrap(config: MamaConfig) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let store = DecisionStore::open(
            &db_path,
            config.embedding_dim,
            !config.disable_vector_search,
        )?;
        let pipeline = EmbeddingPipeline::new(
            config.model_name.clone(),
            config.embedding_dim,
            config.cache_dir.clone(),
            config.force_tier3,
        );
        let cache = EmbeddingCache::new(DEFAULT_CACHE_CAPACITY);

        let state = Self {
            store,
            pipeline,
            cache,
        };
        tracing::info!(
            "Memory engine initialized at {:?} ({})",
            db_path,
            state.tier()
        );
        Ok(state)
    }

    fn tier(&self) -> RetrievalTier {
        if self.pipeline.is_disabled() {
            RetrievalTier::Tier3
        } else if !self.store.vector_search_enabled() {
            RetrievalTier::Tier2
        } else {
            RetrievalTier::Tier1
        }
    }

    /// Embed through the cache.
    fn embed_cached(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        if let Some(vector) = self.cache.get(text, crate::now_ms()) {
            return Ok(vector);
        }
        let vector = self.pipeline.embed(text)?;
        self.cache.set(text, vector.clone(), crate::now_ms());
        Ok(vector)
    }

    // ------------------------------------------------------------------
    // WRITE PATH
    // ------------------------------------------------------------------

    fn save_sync(&self, input: SaveInput) -> Result<SaveReport> {
        input.validate()?;
        let now = crate::now_ms();
        let topic = input.topic.trim().to_string();
        let id = generate_decision_id(&topic, now);

        let previous = self.store.current_for_topic(&topic)?;

        // Multi-parent refinement blends the requested confidence with the
        // parents' mean
        let mut confidence = input.confidence.unwrap_or(0.5);
        if let Some(parents) = input.refined_from.as_ref().filter(|p| !p.is_empty()) {
            let mut parent_confidences = Vec::new();
            for parent_id in parents {
                match self.store.get(parent_id)? {
                    Some(parent) => parent_confidences.push(parent.confidence),
                    None => tracing::warn!("refined_from references missing decision {}", parent_id),
                }
            }
            if !parent_confidences.is_empty() {
                let mean =
                    parent_confidences.iter().sum::<f64>() / parent_confidences.len() as f64;
                confidence = (0.6 * confidence + 0.4 * mean).clamp(0.0, 1.0);
            }
        }

        let decision = Decision {
            id: id.clone(),
            topic,
            decision: input.decision.trim().to_string(),
            reasoning: input.reasoning.trim().to_string(),
            outcome: input.outcome,
            failure_reason: input.failure_reason,
            limitation: input.limitation,
            confidence,
            supersedes: previous.as_ref().map(|p| p.id.clone()),
            superseded_by: None,
            refined_from: input.refined_from,
            created_at: now,
            updated_at: now,
            session_id: input.session_id,
            user_involvement: input.user_involvement,
            evidence: serialize_payload(input.evidence)?,
            alternatives: serialize_payload(input.alternatives)?,
            risks: input.risks,
            trust_context: serialize_payload(input.trust_context)?,
            usage_success: 0,
            usage_failure: 0,
            usage_count: 0,
            time_saved: 0.0,
            needs_validation: false,
            validation_attempts: 0,
            last_validated_at: None,
        };

        // The embedding step runs outside the transaction and its failure
        // is recoverable: the decision is saved without a vector
        let vector = match self.embed_cached(&decision.enriched_text()) {
            Ok(vector) => Some(vector),
            Err(EmbeddingError::Disabled) => None,
            Err(e) => {
                tracing::warn!("Embedding failed, saving {} without a vector: {}", id, e);
                None
            }
        };

        self.store
            .insert_decision(&decision, vector.as_deref(), &self.pipeline.model_name())?;

        // Supersede linkage runs after the insert transaction; a crash in
        // between is repaired by the startup reconciliation scan
        let mut warning = None;
        let mut collaboration_hint = None;
        if let Some(prev) = &previous {
            let mut edge = NewEdge::auto(&decision.id, &prev.id, Relationship::Supersedes, now);
            edge.decision_id = Some(decision.id.clone());
            self.store.ensure_edge(&edge)?;
            self.store.mark_superseded(&prev.id, &decision.id, now)?;

            collaboration_hint = Some(format!(
                "Supersedes {} on topic \"{}\"",
                prev.id, decision.topic
            ));
            if decision.confidence < prev.confidence {
                warning = Some(format!(
                    "Confidence dropped from {:.2} to {:.2} relative to the superseded decision",
                    prev.confidence, decision.confidence
                ));
            }
        }

        let reasoning_graph = self.create_reasoning_edges(&decision, now);
        let similar_decisions = self.find_similar(&decision, vector.as_deref());

        Ok(SaveReport {
            id,
            similar_decisions,
            warning,
            collaboration_hint,
            reasoning_graph,
        })
    }

    /// Create edges for parsed reasoning references. Always best-effort:
    /// missing targets are skipped, insert failures never fail the save.
    fn create_reasoning_edges(&self, decision: &Decision, now: i64) -> Option<ReasoningGraph> {
        let mut graph = ReasoningGraph::default();
        for reference in parse_reasoning_references(&decision.reasoning) {
            if reference.id == decision.id {
                continue;
            }
            match self.store.get(&reference.id) {
                Ok(Some(_)) => {
                    let mut edge =
                        NewEdge::auto(&decision.id, &reference.id, reference.relationship, now);
                    edge.decision_id = Some(decision.id.clone());
                    edge.reason = Some("parsed from reasoning".to_string());
                    match self.store.ensure_edge(&edge) {
                        Ok(()) => graph.edges_created.push(CreatedEdge {
                            to_id: reference.id,
                            relationship: reference.relationship,
                        }),
                        Err(e) => tracing::warn!(
                            "Failed to create {} edge to {}: {}",
                            reference.relationship,
                            reference.id,
                            e
                        ),
                    }
                }
                Ok(None) => {
                    tracing::debug!("Reasoning references unknown decision {}", reference.id);
                    graph.missing_references.push(reference.id);
                }
                Err(e) => tracing::warn!("Lookup failed for reference {}: {}", reference.id, e),
            }
        }
        (!graph.edges_created.is_empty() || !graph.missing_references.is_empty()).then_some(graph)
    }

    /// Semantically similar existing decisions on other topics, advisory
    /// only.
    fn find_similar(&self, decision: &Decision, vector: Option<&[f32]>) -> Vec<SimilarDecision> {
        let Some(vector) = vector else {
            return vec![];
        };
        match self.store.vector_search(vector, 10) {
            Ok(hits) => hits
                .into_iter()
                .filter(|(d, s)| {
                    d.id != decision.id
                        && d.topic != decision.topic
                        && *s >= SIMILAR_DECISION_THRESHOLD
                })
                .take(SIMILAR_DECISION_LIMIT)
                .map(|(d, similarity)| SimilarDecision {
                    id: d.id,
                    topic: d.topic,
                    decision: d.decision,
                    similarity,
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Similar-decision lookup failed: {}", e);
                vec![]
            }
        }
    }

    // ------------------------------------------------------------------
    // READ PATH
    // ------------------------------------------------------------------

    fn recall_sync(&self, topic: &str) -> Result<RecallResult> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(MemoryError::validation("topic must not be empty"));
        }

        let mut fuzzy_matched = false;
        let current = match self.store.current_for_topic(topic)? {
            Some(current) => current,
            None => {
                // One bounded fuzzy retry on the leading keyword
                let keyword = topic.split('_').next().unwrap_or(topic);
                match self.store.current_for_topic_prefix(keyword)? {
                    Some(current) => {
                        fuzzy_matched = true;
                        current
                    }
                    None => return Err(MemoryError::NotFound(topic.to_string())),
                }
            }
        };

        let chain = self.store.chain_from(current)?;
        let ids: Vec<String> = chain.iter().map(|d| d.id.clone()).collect();
        let edges = self.store.edges_for_ids(&ids)?;
        let semantic_edges = categorize_edges(&ids, &edges);

        Ok(RecallResult {
            topic: chain[0].topic.clone(),
            chain_length: chain.len(),
            edge_count: semantic_edges.count(),
            chain,
            semantic_edges,
            fuzzy_matched,
        })
    }

    fn suggest_sync(&self, query: &str, options: SuggestOptions) -> Result<SuggestResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MemoryError::validation("query must not be empty"));
        }
        let limit = options.limit.unwrap_or(DEFAULT_SUGGEST_LIMIT).max(1);
        let recency = options.recency_config();
        let now = crate::now_ms();

        let mut method = SearchMethod::Keyword;
        let mut raw: Vec<(Decision, f32)> = Vec::new();

        if self.store.vector_search_enabled() && !self.pipeline.is_disabled() {
            match self.embed_cached(query) {
                Ok(query_vec) => {
                    let threshold = options
                        .threshold
                        .unwrap_or_else(|| adaptive_threshold(query));
                    let hits = self
                        .store
                        .vector_search(&query_vec, limit * CANDIDATE_MULTIPLIER)?;
                    raw = hits
                        .into_iter()
                        .filter(|(_, similarity)| *similarity >= threshold)
                        .collect();
                    method = SearchMethod::Vector;
                }
                Err(e) => {
                    tracing::warn!("Query embedding failed, using keyword fallback: {}", e)
                }
            }
        }
        if method == SearchMethod::Keyword {
            raw = self
                .store
                .keyword_search(query, limit * CANDIDATE_MULTIPLIER)?
                .into_iter()
                .map(|decision| (decision, KEYWORD_FALLBACK_SIMILARITY))
                .collect();
        }

        let mut candidates: Vec<ScoredCandidate> = raw
            .into_iter()
            .map(|(decision, similarity)| {
                let age_days = decision.age_days(now);
                let recency_value = recency_score(age_days, recency.scale_days, recency.decay);
                let score = if recency.is_disabled() {
                    similarity as f64
                } else {
                    final_score(similarity, recency_value, recency.weight)
                };
                ScoredCandidate {
                    decision,
                    similarity,
                    recency_score: recency_value,
                    recency_age_days: age_days,
                    final_score: score,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
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
        candidates.truncate(limit);

        let expanded = options.reranking_enabled();
        let results = if expanded {
            expand_with_graph(&self.store, candidates, now, &recency)?
        } else {
            candidates.into_iter().map(|c| c.into_primary()).collect()
        };

        Ok(SuggestResponse {
            results,
            search_method: method.label(expanded),
        })
    }

    fn inject_context_sync(&self, query: &str) -> Result<ContextInjection> {
        let query_vec = if self.pipeline.is_disabled() {
            None
        } else {
            self.embed_cached(query).ok()
        };
        let candidates = self.store.recent_with_embeddings(CONTEXT_CANDIDATE_POOL)?;
        let decisions = rank_by_relevance(
            query_vec.as_deref(),
            candidates,
            crate::now_ms(),
            DEFAULT_CONTEXT_LIMIT,
        );
        Ok(ContextInjection {
            decisions,
            elapsed_ms: 0,
        })
    }

    fn stats_sync(&self) -> Result<EngineStats> {
        let counts = self.store.counts()?;
        let edges_by_type = self.store.edge_type_counts()?.into_iter().collect();
        Ok(EngineStats {
            total_decisions: counts.total_decisions,
            active_decisions: counts.active_decisions,
            total_edges: counts.total_edges,
            pending_links: counts.pending_links,
            embeddings_stored: counts.embeddings_stored,
            edges_by_type,
            tier: self.tier(),
            vector_search_enabled: self.store.vector_search_enabled(),
            cache: self.cache.stats(),
        })
    }
}

fn serialize_payload(value: Option<serde_json::Value>) -> Result<Option<String>> {
    value
        .map(|v| serde_json::to_string(&v))
        .transpose()
        .map_err(|e| MemoryError::validation(format!("unserializable payload: {e}")))
}

// ============================================================================
// ENGINE
// ============================================================================

/// The decision memory engine
///
/// All methods take `&self`; the engine is `Send + Sync` and can sit behind
/// an `Arc` shared across tasks.
pub struct MemoryEngine {
    config: Mutex<MamaConfig>,
    state: RwLock<Option<Arc<EngineState>>>,
    init_lock: tokio::sync::Mutex<()>,
}

static GLOBAL_ENGINE: OnceLock<MemoryEngine> = OnceLock::new();

impl MemoryEngine {
    /// Create an engine with an explicit configuration. Nothing touches
    /// disk until `init()`.
    pub fn new(config: MamaConfig) -> Self {
        Self {
            config: Mutex::new(config),
            state: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Process-wide default engine, configured from disk and environment on
    /// first access.
    pub fn global() -> &'static MemoryEngine {
        GLOBAL_ENGINE.get_or_init(|| MemoryEngine::new(MamaConfig::load()))
    }

    /// Whether `init()` has completed successfully.
    pub fn is_initialized(&self) -> bool {
        self.state
            .read()
            .map(|state| state.is_some())
            .unwrap_or(false)
    }

    fn state(&self) -> Result<Arc<EngineState>> {
        self.state
            .read()
            .map_err(|_| MemoryError::Internal("state lock poisoned".to_string()))?
            .clone()
            .ok_or(MemoryError::NotInitialized)
    }

    fn set_state(&self, value: Option<Arc<EngineState>>) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| MemoryError::Internal("state lock poisoned".to_string()))?;
        *state = value;
        Ok(())
    }

    /// Initialize: connect, migrate, detect vector capability, reconcile
    /// chains. Idempotent and single-flight; concurrent callers share one
    /// bootstrap. On failure all partial state is cleared so the next call
    /// retries from scratch.
    pub async fn init(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        let config = self
            .config
            .lock()
            .map_err(|_| MemoryError::Internal("config lock poisoned".to_string()))?
            .clone();

        let bootstrap = tokio::task::spawn_blocking(move || EngineState::bootstrap(config))
            .await
            .map_err(|e| MemoryError::Internal(format!("init task failed: {e}")))?;

        match bootstrap {
            Ok(state) => {
                self.set_state(Some(Arc::new(state)))?;
                Ok(())
            }
            Err(e) => {
                self.set_state(None)?;
                Err(e)
            }
        }
    }

    /// Drop all state. The database connection closes when the last
    /// in-flight operation finishes.
    pub async fn close(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        self.set_state(None)
    }

    /// Re-read configuration from disk. A model or dimension change resets
    /// the pipeline and clears the embedding cache; returns whether a
    /// change was applied.
    pub async fn reload_config(&self) -> Result<bool> {
        let fresh = MamaConfig::load();
        {
            let mut config = self
                .config
                .lock()
                .map_err(|_| MemoryError::Internal("config lock poisoned".to_string()))?;
            *config = fresh.clone();
        }
        let Ok(state) = self.state() else {
            return Ok(false);
        };
        let changed = state.pipeline.reconfigure(
            &fresh.model_name,
            fresh.embedding_dim,
            fresh.cache_dir.clone(),
        );
        if changed {
            state.cache.clear();
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // PUBLIC SURFACE
    // ------------------------------------------------------------------

    /// Persist a new decision: embed, insert, maintain the supersede chain,
    /// and create edges from parsed reasoning references.
    pub async fn save(&self, input: SaveInput) -> Result<SaveReport> {
        let state = self.state()?;
        tokio::task::spawn_blocking(move || state.save_sync(input))
            .await
            .map_err(|e| MemoryError::Internal(format!("save task failed: {e}")))?
    }

    /// The supersede chain for a topic, newest first, with categorized
    /// semantic edges.
    pub async fn recall(&self, topic: &str) -> Result<RecallResult> {
        self.state()?.recall_sync(topic)
    }

    /// Ranked similarity retrieval with recency re-scoring and graph
    /// expansion.
    pub async fn suggest(&self, query: &str, options: SuggestOptions) -> Result<SuggestResponse> {
        let state = self.state()?;
        let query = query.to_string();
        tokio::task::spawn_blocking(move || state.suggest_sync(&query, options))
            .await
            .map_err(|e| MemoryError::Internal(format!("suggest task failed: {e}")))?
    }

    /// Select the most relevant decisions for context injection, under a
    /// 5 second end-to-end budget.
    pub async fn inject_context(&self, query: &str) -> Result<ContextInjection> {
        let state = self.state()?;
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(MemoryError::validation("query must not be empty"));
        }

        let started = std::time::Instant::now();
        let task = tokio::task::spawn_blocking(move || state.inject_context_sync(&query));
        match tokio::time::timeout(Duration::from_millis(INJECTION_BUDGET_MS), task).await {
            Ok(joined) => {
                let mut injection = joined
                    .map_err(|e| MemoryError::Internal(format!("inject task failed: {e}")))??;
                injection.elapsed_ms = started.elapsed().as_millis() as u64;
                Ok(injection)
            }
            Err(_) => Err(MemoryError::Timeout(INJECTION_BUDGET_MS)),
        }
    }

    /// Set a decision's outcome. The outcome string normalizes
    /// case-insensitively to SUCCESS / FAILED / PARTIAL.
    pub async fn update_outcome(&self, id: &str, update: OutcomeUpdate) -> Result<Decision> {
        let state = self.state()?;
        let outcome = Outcome::parse(&update.outcome)?;
        state.store.update_outcome(
            id,
            outcome,
            update.failure_reason.as_deref(),
            update.limitation.as_deref(),
            crate::now_ms(),
        )?;
        state
            .store
            .get(id)?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    /// Classify free-text feedback and attach the outcome to the session's
    /// newest undecided decision.
    pub async fn track_feedback(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<Option<OutcomeFeedback>> {
        let state = self.state()?;
        OutcomeTracker::track(&state.store, message, session_id, crate::now_ms())
    }

    /// Recent current decisions, newest first.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<Decision>> {
        self.state()?.store.list_recent(limit.unwrap_or(20))
    }

    /// Fetch one decision.
    pub async fn get(&self, id: &str) -> Result<Decision> {
        self.state()?
            .store
            .get(id)?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    /// Record that a caller applied a decision, successfully or not.
    pub async fn record_usage(&self, id: &str, success: bool) -> Result<()> {
        self.state()?.store.record_usage(id, success, crate::now_ms())
    }

    /// Propose a typed link between two decisions, pending approval.
    pub async fn propose_link(
        &self,
        from_id: &str,
        to_id: &str,
        relationship: Relationship,
        reason: Option<String>,
    ) -> Result<i64> {
        let state = self.state()?;
        for id in [from_id, to_id] {
            if state.store.get(id)?.is_none() {
                return Err(MemoryError::NotFound(id.to_string()));
            }
        }
        let mut edge = NewEdge::auto(from_id, to_id, relationship, crate::now_ms());
        edge.created_by = CreatedBy::User;
        edge.approved_by_user = Some(false);
        edge.reason = reason;
        state.store.insert_edge(&edge)
    }

    /// Approve a pending link; it becomes visible to graph reads.
    pub async fn approve_link(&self, link_id: i64) -> Result<()> {
        self.state()?.store.approve_link(link_id, crate::now_ms())
    }

    /// Reject (delete) a pending link.
    pub async fn reject_link(&self, link_id: i64) -> Result<()> {
        self.state()?.store.reject_link(link_id)
    }

    /// Links awaiting approval.
    pub async fn get_pending_links(&self) -> Result<Vec<DecisionEdge>> {
        self.state()?.store.pending_links()
    }

    /// Engine statistics snapshot.
    pub async fn stats(&self) -> Result<EngineStats> {
        self.state()?.stats_sync()
    }
}

// ============================================================================
// TESTS
// ============================================================================
