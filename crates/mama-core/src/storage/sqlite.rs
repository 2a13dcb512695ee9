//! SQLite decision store
//!
//! The single chokepoint for persistent I/O. One connection, all statements
//! prepared from it, and `transaction`-grouped writes. Embedding vectors are
//! stored as little-endian f32 BLOBs in the same transaction as their
//! decision row; the HNSW index over them is in-memory and rebuilt from the
//! BLOB table on connect, so readers always observe row and vector together
//! or not at all.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::decision::{Decision, Outcome};
use crate::error::{MemoryError, Result};
use crate::graph::{CreatedBy, DecisionEdge, Relationship};

#[cfg(feature = "vector-search")]
use crate::search::VectorIndex;

/// Column list shared by every decision SELECT, in `row_to_decision` order.
const DECISION_COLUMNS: &str = "id, topic, decision, reasoning, outcome, failure_reason, \
     limitation, confidence, supersedes, superseded_by, refined_from, created_at, updated_at, \
     session_id, user_involvement, evidence, alternatives, risks, trust_context, usage_success, \
     usage_failure, usage_count, time_saved, needs_validation, validation_attempts, \
     last_validated_at";

/// Column list shared by every edge SELECT, in `row_to_edge` order.
const EDGE_COLUMNS: &str = "id, from_id, to_id, relationship, reason, created_by, \
     approved_by_user, decision_id, evidence, created_at, approved_at";

/// Approval filter: pending edges (`approved_by_user = 0`) are excluded;
/// NULL means auto-created and counts as approved.
const APPROVED: &str = "COALESCE(approved_by_user, 1) <> 0";

// ============================================================================
// HELPERS
// ============================================================================

/// Serialize a vector to little-endian f32 bytes.
fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize little-endian f32 bytes back into a vector.
fn bytes_to_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Escape `%`, `_`, and the escape char itself for a LIKE pattern.
fn escape_like(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if c == '%' || c == '_' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn row_to_decision(row: &Row<'_>) -> rusqlite::Result<Decision> {
    let outcome: Option<String> = row.get(4)?;
    let refined_from: Option<String> = row.get(10)?;
    let needs_validation: i64 = row.get(23)?;
    Ok(Decision {
        id: row.get(0)?,
        topic: row.get(1)?,
        decision: row.get(2)?,
        reasoning: row.get(3)?,
        outcome: outcome.and_then(|s| Outcome::parse(&s).ok()),
        failure_reason: row.get(5)?,
        limitation: row.get(6)?,
        confidence: row.get(7)?,
        supersedes: row.get(8)?,
        superseded_by: row.get(9)?,
        refined_from: refined_from.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        session_id: row.get(13)?,
        user_involvement: row.get(14)?,
        evidence: row.get(15)?,
        alternatives: row.get(16)?,
        risks: row.get(17)?,
        trust_context: row.get(18)?,
        usage_success: row.get(19)?,
        usage_failure: row.get(20)?,
        usage_count: row.get(21)?,
        time_saved: row.get(22)?,
        needs_validation: needs_validation != 0,
        validation_attempts: row.get(24)?,
        last_validated_at: row.get(25)?,
    })
}

fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<DecisionEdge> {
    let relationship: String = row.get(3)?;
    let relationship = Relationship::parse(&relationship).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("illegal relationship: {relationship}").into(),
        )
    })?;
    let created_by: String = row.get(5)?;
    let approved: Option<i64> = row.get(6)?;
    Ok(DecisionEdge {
        id: row.get(0)?,
        from_id: row.get(1)?,
        to_id: row.get(2)?,
        relationship,
        reason: row.get(4)?,
        created_by: CreatedBy::parse_lossy(&created_by),
        approved_by_user: approved.map(|v| v != 0),
        decision_id: row.get(7)?,
        evidence: row.get(8)?,
        created_at: row.get(9)?,
        approved_at: row.get(10)?,
    })
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Parameters for inserting an edge
#[derive(Debug, Clone)]
pub struct NewEdge {
    /// Source decision id
    pub from_id: String,
    /// Target decision id
    pub to_id: String,
    /// Relationship type
    pub relationship: Relationship,
    /// Free-text reason
    pub reason: Option<String>,
    /// Who created the edge
    pub created_by: CreatedBy,
    /// Approval state: approved, pending, or unset
    pub approved_by_user: Option<bool>,
    /// Decision whose reasoning spawned the edge
    pub decision_id: Option<String>,
    /// Supporting evidence
    pub evidence: Option<String>,
    /// Creation time, milliseconds
    pub created_at: i64,
}

impl NewEdge {
    /// An auto-approved edge created by the writer.
    pub fn auto(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        relationship: Relationship,
        now_ms: i64,
    ) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            relationship,
            reason: None,
            created_by: CreatedBy::Llm,
            approved_by_user: Some(true),
            decision_id: None,
            evidence: None,
            created_at: now_ms,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.from_id == self.to_id {
            return Err(MemoryError::validation_field(
                "an edge cannot connect a decision to itself",
                "to_id",
                &self.to_id,
            ));
        }
        Ok(())
    }
}

/// Row counts for stats reporting
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCounts {
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
}

// ============================================================================
// STORE
// ============================================================================

/// SQLite-backed decision store
pub struct DecisionStore {
    conn: Mutex<Connection>,
    #[cfg(feature = "vector-search")]
    vector_index: Mutex<Option<VectorIndex>>,
    embedding_dim: usize,
    path: PathBuf,
}

impl DecisionStore {
    /// Open (creating if needed) the database at `path`, run migrations,
    /// bootstrap the vector index, and repair half-written supersede chains.
    pub fn open(path: &Path, embedding_dim: usize, enable_vector: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        super::migrations::apply_migrations(&mut conn)?;

        #[cfg(feature = "vector-search")]
        let vector_index = if enable_vector {
            match VectorIndex::new(embedding_dim) {
                Ok(index) => Some(index),
                Err(e) => {
                    tracing::warn!(
                        "Vector index unavailable, degrading to keyword retrieval: {}",
                        e
                    );
                    None
                }
            }
        } else {
            tracing::info!("Vector search disabled by configuration");
            None
        };

        #[cfg(not(feature = "vector-search"))]
        let _ = enable_vector;

        let store = Self {
            conn: Mutex::new(conn),
            #[cfg(feature = "vector-search")]
            vector_index: Mutex::new(vector_index),
            embedding_dim,
            path: path.to_path_buf(),
        };

        #[cfg(feature = "vector-search")]
        store.load_embeddings_into_index()?;

        let repaired = store.reconcile_chains(crate::now_ms())?;
        if repaired > 0 {
            tracing::info!("Repaired {} half-written supersede chains", repaired);
        }

        Ok(store)
    }

    /// Database file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured embedding dimension.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MemoryError::Internal("connection lock poisoned".to_string()))
    }

    /// Whether vector similarity queries can be served.
    #[cfg(feature = "vector-search")]
    pub fn vector_search_enabled(&self) -> bool {
        self.vector_index
            .lock()
            .map(|index| index.is_some())
            .unwrap_or(false)
    }

    /// Whether vector similarity queries can be served.
    #[cfg(not(feature = "vector-search"))]
    pub fn vector_search_enabled(&self) -> bool {
        false
    }

    /// Rebuild the in-memory index from the durable BLOB table.
    #[cfg(feature = "vector-search")]
    fn load_embeddings_into_index(&self) -> Result<()> {
        let rows: Vec<(i64, i64, Vec<u8>)> = {
            let conn = self.lock_conn()?;
            let mut stmt = conn.prepare(
                "SELECT d.rowid, e.dimensions, e.embedding
                 FROM decision_embeddings e
                 JOIN decisions d ON d.id = e.decision_id",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut guard = self
            .vector_index
            .lock()
            .map_err(|_| MemoryError::Internal("vector index lock poisoned".to_string()))?;
        let Some(index) = guard.as_mut() else {
            return Ok(());
        };

        for (rowid, dimensions, bytes) in rows {
            if dimensions as usize != self.embedding_dim {
                return Err(MemoryError::Embedding(format!(
                    "stored vector for rowid {} has dimension {}, database is configured for {}",
                    rowid, dimensions, self.embedding_dim
                )));
            }
            let Some(vector) = bytes_to_vector(&bytes) else {
                return Err(MemoryError::Embedding(format!(
                    "stored vector for rowid {} is corrupt",
                    rowid
                )));
            };
            if let Err(e) = index.add(rowid as u64, &vector) {
                tracing::warn!("Failed to index embedding for rowid {}: {}", rowid, e);
            }
        }

        Ok(())
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Insert a decision, and its vector when one is supplied and vector
    /// search is available, in a single transaction.
    ///
    /// A supplied vector with vector search unavailable is the one permitted
    /// silent degradation: the row is committed, the vector is dropped with
    /// a warning.
    pub fn insert_decision(
        &self,
        decision: &Decision,
        vector: Option<&[f32]>,
        model: &str,
    ) -> Result<()> {
        if let Some(v) = vector {
            if v.len() != self.embedding_dim {
                return Err(MemoryError::Embedding(format!(
                    "vector dimension {} does not match configured dimension {}",
                    v.len(),
                    self.embedding_dim
                )));
            }
        }

        let refined_from = decision
            .refined_from
            .as_ref()
            .map(|parents| serde_json::to_string(parents))
            .transpose()
            .map_err(|e| MemoryError::Internal(format!("refined_from serialization: {e}")))?;

        let store_vector = vector.is_some() && self.vector_search_enabled();
        if vector.is_some() && !store_vector {
            tracing::warn!(
                "Vector search unavailable; decision {} saved without a vector",
                decision.id
            );
        }

        let rowid = {
            let mut conn = self.lock_conn()?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO decisions (
                    id, topic, decision, reasoning, outcome, failure_reason, limitation,
                    confidence, supersedes, superseded_by, refined_from, created_at, updated_at,
                    session_id, user_involvement, evidence, alternatives, risks, trust_context,
                    usage_success, usage_failure, usage_count, time_saved,
                    needs_validation, validation_attempts, last_validated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                    ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19,
                    ?20, ?21, ?22, ?23,
                    ?24, ?25, ?26
                )",
                params![
                    decision.id,
                    decision.topic,
                    decision.decision,
                    decision.reasoning,
                    decision.outcome.map(|o| o.as_str()),
                    decision.failure_reason,
                    decision.limitation,
                    decision.confidence.clamp(0.0, 1.0),
                    decision.supersedes,
                    decision.superseded_by,
                    refined_from,
                    decision.created_at,
                    decision.updated_at,
                    decision.session_id,
                    decision.user_involvement,
                    decision.evidence,
                    decision.alternatives,
                    decision.risks,
                    decision.trust_context,
                    decision.usage_success,
                    decision.usage_failure,
                    decision.usage_count,
                    decision.time_saved,
                    decision.needs_validation as i64,
                    decision.validation_attempts,
                    decision.last_validated_at,
                ],
            )?;
            let rowid = tx.last_insert_rowid();

            if store_vector {
                if let Some(v) = vector {
                    tx.execute(
                        "INSERT INTO decision_embeddings
                            (decision_id, embedding, dimensions, model, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            decision.id,
                            vector_to_bytes(v),
                            v.len() as i64,
                            model,
                            decision.created_at
                        ],
                    )?;
                }
            }

            tx.commit()?;
            rowid
        };

        #[cfg(feature = "vector-search")]
        if store_vector {
            if let Some(v) = vector {
                let mut guard = self
                    .vector_index
                    .lock()
                    .map_err(|_| MemoryError::Internal("vector index lock poisoned".to_string()))?;
                if let Some(index) = guard.as_mut() {
                    if let Err(e) = index.add(rowid as u64, v) {
                        // Durable copy is committed; the index catches up on restart
                        tracing::warn!("Failed to index embedding for {}: {}", decision.id, e);
                    }
                }
            }
        }
        #[cfg(not(feature = "vector-search"))]
        let _ = rowid;

        Ok(())
    }

    /// Set the supersede back-pointer on `prev_id`. Only the unset → set
    /// transition is allowed; returns whether a row changed.
    pub fn mark_superseded(&self, prev_id: &str, new_id: &str, now_ms: i64) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE decisions SET superseded_by = ?1, updated_at = ?2
             WHERE id = ?3 AND superseded_by IS NULL",
            params![new_id, now_ms, prev_id],
        )?;
        Ok(changed > 0)
    }

    /// Insert an edge, ignoring an existing duplicate (same endpoints and
    /// relationship). Used by the writer and by reconciliation.
    pub fn ensure_edge(&self, edge: &NewEdge) -> Result<()> {
        edge.validate()?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO decision_edges
                (from_id, to_id, relationship, reason, created_by, approved_by_user,
                 decision_id, evidence, created_at, approved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                edge.from_id,
                edge.to_id,
                edge.relationship.as_str(),
                edge.reason,
                edge.created_by.as_str(),
                edge.approved_by_user.map(|v| v as i64),
                edge.decision_id,
                edge.evidence,
                edge.created_at,
                edge.approved_by_user
                    .and_then(|approved| approved.then_some(edge.created_at)),
            ],
        )?;
        Ok(())
    }

    /// Insert an edge, failing on duplicates. Returns the new edge id.
    pub fn insert_edge(&self, edge: &NewEdge) -> Result<i64> {
        edge.validate()?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO decision_edges
                (from_id, to_id, relationship, reason, created_by, approved_by_user,
                 decision_id, evidence, created_at, approved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                edge.from_id,
                edge.to_id,
                edge.relationship.as_str(),
                edge.reason,
                edge.created_by.as_str(),
                edge.approved_by_user.map(|v| v as i64),
                edge.decision_id,
                edge.evidence,
                edge.created_at,
                edge.approved_by_user
                    .and_then(|approved| approved.then_some(edge.created_at)),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update a decision's outcome fields. Fails with NotFound for an
    /// unknown id.
    pub fn update_outcome(
        &self,
        id: &str,
        outcome: Outcome,
        failure_reason: Option<&str>,
        limitation: Option<&str>,
        now_ms: i64,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE decisions
             SET outcome = ?1, failure_reason = ?2, limitation = ?3, updated_at = ?4
             WHERE id = ?5",
            params![outcome.as_str(), failure_reason, limitation, now_ms, id],
        )?;
        if changed == 0 {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Apply tracked outcome feedback in one statement: outcome, optional
    /// failure reason, adjusted confidence, and validation flagging.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_outcome_feedback(
        &self,
        id: &str,
        outcome: Outcome,
        failure_reason: Option<&str>,
        confidence: f64,
        needs_validation: bool,
        now_ms: i64,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE decisions
             SET outcome = ?1, failure_reason = COALESCE(?2, failure_reason),
                 confidence = ?3, needs_validation = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                outcome.as_str(),
                failure_reason,
                confidence.clamp(0.0, 1.0),
                needs_validation as i64,
                now_ms,
                id
            ],
        )?;
        if changed == 0 {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Update confidence, clamped to [0, 1].
    pub fn update_confidence(&self, id: &str, confidence: f64, now_ms: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE decisions SET confidence = ?1, updated_at = ?2 WHERE id = ?3",
            params![confidence.clamp(0.0, 1.0), now_ms, id],
        )?;
        if changed == 0 {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Bump usage counters after a caller applies a decision.
    pub fn record_usage(&self, id: &str, success: bool, now_ms: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE decisions
             SET usage_count = usage_count + 1,
                 usage_success = usage_success + ?1,
                 usage_failure = usage_failure + ?2,
                 updated_at = ?3
             WHERE id = ?4",
            params![success as i64, (!success) as i64, now_ms, id],
        )?;
        if changed == 0 {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Fetch a decision by id.
    pub fn get(&self, id: &str) -> Result<Option<Decision>> {
        let conn = self.lock_conn()?;
        let decision = conn
            .query_row(
                &format!("SELECT {DECISION_COLUMNS} FROM decisions WHERE id = ?1"),
                params![id],
                row_to_decision,
            )
            .optional()?;
        Ok(decision)
    }

    /// Fetch a decision by storage row id.
    pub fn get_by_rowid(&self, rowid: i64) -> Result<Option<Decision>> {
        let conn = self.lock_conn()?;
        let decision = conn
            .query_row(
                &format!("SELECT {DECISION_COLUMNS} FROM decisions WHERE rowid = ?1"),
                params![rowid],
                row_to_decision,
            )
            .optional()?;
        Ok(decision)
    }

    /// The current (non-superseded) decision for a topic.
    pub fn current_for_topic(&self, topic: &str) -> Result<Option<Decision>> {
        let conn = self.lock_conn()?;
        let decision = conn
            .query_row(
                &format!(
                    "SELECT {DECISION_COLUMNS} FROM decisions
                     WHERE topic = ?1 AND superseded_by IS NULL
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![topic],
                row_to_decision,
            )
            .optional()?;
        Ok(decision)
    }

    /// Bounded fuzzy fallback: the most recent current decision whose topic
    /// starts with `prefix`.
    pub fn current_for_topic_prefix(&self, prefix: &str) -> Result<Option<Decision>> {
        if prefix.is_empty() {
            return Ok(None);
        }
        let pattern = format!("{}%", escape_like(prefix));
        let conn = self.lock_conn()?;
        let decision = conn
            .query_row(
                &format!(
                    "SELECT {DECISION_COLUMNS} FROM decisions
                     WHERE topic LIKE ?1 ESCAPE '\\' AND superseded_by IS NULL
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![pattern],
                row_to_decision,
            )
            .optional()?;
        Ok(decision)
    }

    /// Walk the supersede chain starting at `head`, most recent first.
    /// A cycle (corrupt data) terminates the walk rather than hanging.
    pub fn chain_from(&self, head: Decision) -> Result<Vec<Decision>> {
        let mut seen = std::collections::HashSet::new();
        seen.insert(head.id.clone());
        let mut chain = vec![head];

        loop {
            let next_id = match &chain[chain.len() - 1].supersedes {
                Some(id) => id.clone(),
                None => break,
            };
            if !seen.insert(next_id.clone()) {
                tracing::warn!("Supersede cycle detected at {}", next_id);
                break;
            }
            match self.get(&next_id)? {
                Some(older) => chain.push(older),
                None => {
                    tracing::warn!("Supersede chain points at missing decision {}", next_id);
                    break;
                }
            }
        }

        Ok(chain)
    }

    /// The full chain containing `id`: walk forward to the current head via
    /// back-pointers, then down through `supersedes`. Most recent first.
    pub fn full_chain(&self, id: &str) -> Result<Vec<Decision>> {
        let Some(mut head) = self.get(id)? else {
            return Ok(vec![]);
        };

        let mut seen = std::collections::HashSet::new();
        seen.insert(head.id.clone());
        while let Some(newer_id) = head.superseded_by.clone() {
            if !seen.insert(newer_id.clone()) {
                tracing::warn!("Supersede cycle detected at {}", newer_id);
                break;
            }
            match self.get(&newer_id)? {
                Some(newer) => head = newer,
                None => break,
            }
        }

        self.chain_from(head)
    }

    /// Approved semantic edges (everything but supersedes) touching any of
    /// `ids`, in either direction.
    pub fn edges_for_ids(&self, ids: &[String]) -> Result<Vec<DecisionEdge>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM decision_edges
             WHERE relationship <> 'supersedes' AND {APPROVED}
               AND (from_id IN ({placeholders}) OR to_id IN ({placeholders}))
             ORDER BY created_at DESC"
        );
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let edges = stmt
            .query_map(
                params_from_iter(ids.iter().chain(ids.iter())),
                row_to_edge,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Approved semantic edges touching one decision.
    pub fn edges_touching(&self, id: &str) -> Result<Vec<DecisionEdge>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM decision_edges
             WHERE relationship <> 'supersedes' AND {APPROVED}
               AND (from_id = ?1 OR to_id = ?1)
             ORDER BY created_at DESC"
        ))?;
        let edges = stmt
            .query_map(params![id], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Tokenized keyword fallback over topic and decision text, restricted
    /// to current decisions, newest first.
    pub fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<Decision>> {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Ok(vec![]);
        }

        let mut clauses = Vec::with_capacity(tokens.len());
        let mut patterns: Vec<String> = Vec::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            let p = i + 1;
            clauses.push(format!(
                "LOWER(topic) LIKE ?{p} ESCAPE '\\' OR LOWER(decision) LIKE ?{p} ESCAPE '\\'"
            ));
            patterns.push(format!("%{}%", escape_like(token)));
        }
        let sql = format!(
            "SELECT {DECISION_COLUMNS} FROM decisions
             WHERE superseded_by IS NULL AND ({})
             ORDER BY created_at DESC LIMIT ?{}",
            clauses.join(" OR "),
            tokens.len() + 1
        );

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let decisions = stmt
            .query_map(
                params_from_iter(
                    patterns
                        .iter()
                        .map(|p| p as &dyn rusqlite::ToSql)
                        .chain(std::iter::once(&(limit as i64) as &dyn rusqlite::ToSql)),
                ),
                row_to_decision,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(decisions)
    }

    /// Nearest stored decisions to `query_vec`. Empty when vector search is
    /// unavailable (the caller degrades to keyword retrieval).
    #[cfg(feature = "vector-search")]
    pub fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<(Decision, f32)>> {
        let hits = {
            let guard = self
                .vector_index
                .lock()
                .map_err(|_| MemoryError::Internal("vector index lock poisoned".to_string()))?;
            let Some(index) = guard.as_ref() else {
                return Ok(vec![]);
            };
            index
                .search(query_vec, limit)
                .map_err(|e| MemoryError::Embedding(e.to_string()))?
        };

        let mut results = Vec::with_capacity(hits.len());
        for (rowid, similarity) in hits {
            match self.get_by_rowid(rowid as i64) {
                Ok(Some(decision)) => results.push((decision, similarity)),
                Ok(None) => tracing::warn!("Vector hit for missing rowid {}", rowid),
                Err(e) => tracing::warn!("Failed to load vector hit {}: {}", rowid, e),
            }
        }
        Ok(results)
    }

    /// Nearest stored decisions to `query_vec`. Always empty without the
    /// `vector-search` feature.
    #[cfg(not(feature = "vector-search"))]
    pub fn vector_search(&self, _query_vec: &[f32], _limit: usize) -> Result<Vec<(Decision, f32)>> {
        Ok(vec![])
    }

    /// Stored embedding for a decision, validated against the configured
    /// dimension.
    pub fn embedding_for(&self, id: &str) -> Result<Option<Vec<f32>>> {
        let row: Option<(i64, Vec<u8>)> = {
            let conn = self.lock_conn()?;
            conn.query_row(
                "SELECT dimensions, embedding FROM decision_embeddings WHERE decision_id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };
        let Some((dimensions, bytes)) = row else {
            return Ok(None);
        };
        if dimensions as usize != self.embedding_dim {
            return Err(MemoryError::Embedding(format!(
                "stored vector for {} has dimension {}, database is configured for {}",
                id, dimensions, self.embedding_dim
            )));
        }
        bytes_to_vector(&bytes)
            .map(Some)
            .ok_or_else(|| MemoryError::Embedding(format!("stored vector for {id} is corrupt")))
    }

    /// Newest decision in a session without an outcome, created at or after
    /// `since_ms`.
    pub fn latest_unresolved_for_session(
        &self,
        session_id: &str,
        since_ms: i64,
    ) -> Result<Option<Decision>> {
        let conn = self.lock_conn()?;
        let decision = conn
            .query_row(
                &format!(
                    "SELECT {DECISION_COLUMNS} FROM decisions
                     WHERE session_id = ?1 AND outcome IS NULL AND created_at >= ?2
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![session_id, since_ms],
                row_to_decision,
            )
            .optional()?;
        Ok(decision)
    }

    /// Recent current decisions, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Decision>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DECISION_COLUMNS} FROM decisions
             WHERE superseded_by IS NULL
             ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let decisions = stmt
            .query_map(params![limit as i64], row_to_decision)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(decisions)
    }

    /// Recent current decisions with their stored vectors, for relevance
    /// scoring.
    pub fn recent_with_embeddings(
        &self,
        limit: usize,
    ) -> Result<Vec<(Decision, Option<Vec<f32>>)>> {
        let decisions = self.list_recent(limit)?;
        let mut out = Vec::with_capacity(decisions.len());
        for decision in decisions {
            let vector = self.embedding_for(&decision.id)?;
            out.push((decision, vector));
        }
        Ok(out)
    }

    // ========================================================================
    // LINK MANAGEMENT
    // ========================================================================

    /// Edges awaiting user approval.
    pub fn pending_links(&self) -> Result<Vec<DecisionEdge>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM decision_edges
             WHERE approved_by_user = 0
             ORDER BY created_at DESC"
        ))?;
        let edges = stmt
            .query_map([], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Approve a pending link.
    pub fn approve_link(&self, link_id: i64, now_ms: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE decision_edges SET approved_by_user = 1, approved_at = ?1
             WHERE id = ?2 AND approved_by_user = 0",
            params![now_ms, link_id],
        )?;
        if changed == 0 {
            return Err(MemoryError::LinkNotFound(link_id));
        }
        Ok(())
    }

    /// Reject (delete) a pending link.
    pub fn reject_link(&self, link_id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "DELETE FROM decision_edges WHERE id = ?1 AND approved_by_user = 0",
            params![link_id],
        )?;
        if changed == 0 {
            return Err(MemoryError::LinkNotFound(link_id));
        }
        Ok(())
    }

    // ========================================================================
    // MAINTENANCE & STATS
    // ========================================================================

    /// Repair supersede chains left half-written by a crash between the
    /// decision insert and the back-pointer update: set the missing
    /// back-pointer and re-create the missing edge. Returns the number of
    /// repaired links.
    pub fn reconcile_chains(&self, now_ms: i64) -> Result<usize> {
        let broken: Vec<(String, String)> = {
            let conn = self.lock_conn()?;
            let mut stmt = conn.prepare(
                "SELECT d.id, d.supersedes FROM decisions d
                 JOIN decisions p ON p.id = d.supersedes
                 WHERE p.superseded_by IS NULL
                    OR (p.superseded_by = d.id AND NOT EXISTS (
                        SELECT 1 FROM decision_edges e
                        WHERE e.from_id = d.id AND e.to_id = p.id
                          AND e.relationship = 'supersedes'
                    ))",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut repaired = 0;
        for (child_id, parent_id) in broken {
            let mut edge = NewEdge::auto(&child_id, &parent_id, Relationship::Supersedes, now_ms);
            edge.created_by = CreatedBy::System;
            self.ensure_edge(&edge)?;
            self.mark_superseded(&parent_id, &child_id, now_ms)?;
            repaired += 1;
        }
        Ok(repaired)
    }

    /// Row counts for stats reporting.
    pub fn counts(&self) -> Result<StoreCounts> {
        let conn = self.lock_conn()?;
        let total_decisions: i64 =
            conn.query_row("SELECT COUNT(*) FROM decisions", [], |r| r.get(0))?;
        let active_decisions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM decisions WHERE superseded_by IS NULL",
            [],
            |r| r.get(0),
        )?;
        let total_edges: i64 =
            conn.query_row("SELECT COUNT(*) FROM decision_edges", [], |r| r.get(0))?;
        let pending_links: i64 = conn.query_row(
            "SELECT COUNT(*) FROM decision_edges WHERE approved_by_user = 0",
            [],
            |r| r.get(0),
        )?;
        let embeddings_stored: i64 =
            conn.query_row("SELECT COUNT(*) FROM decision_embeddings", [], |r| r.get(0))?;
        Ok(StoreCounts {
            total_decisions,
            active_decisions,
            total_edges,
            pending_links,
            embeddings_stored,
        })
    }

    /// Edge counts per relationship type.
    pub fn edge_type_counts(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT relationship, COUNT(*) FROM decision_edges
             GROUP BY relationship ORDER BY relationship",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::generate_decision_id;

    const TEST_DIM: usize = 8;

    fn open_store(dir: &tempfile::TempDir, enable_vector: bool) -> DecisionStore {
        DecisionStore::open(&dir.path().join("mama.db"), TEST_DIM, enable_vector).unwrap()
    }

    fn make_decision(topic: &str, text: &str, created_at: i64) -> Decision {
        Decision {
            id: generate_decision_id(topic, created_at),
            topic: topic.to_string(),
            decision: text.to_string(),
            reasoning: "reasoning".to_string(),
            outcome: None,
            failure_reason: None,
            limitation: None,
            confidence: 0.5,
            supersedes: None,
            superseded_by: None,
            refined_from: None,
            created_at,
            updated_at: created_at,
            session_id: Some("session-1".to_string()),
            user_involvement: None,
            evidence: None,
            alternatives: None,
            risks: None,
            trust_context: None,
            usage_success: 0,
            usage_failure: 0,
            usage_count: 0,
            time_saved: 0.0,
            needs_validation: false,
            validation_attempts: 0,
            last_validated_at: None,
        }
    }

    fn unit_vector(seed: usize) -> Vec<f32> {
        let raw: Vec<f32> = (0..TEST_DIM)
            .map(|i| ((i + seed) as f32 / TEST_DIM as f32).sin())
            .collect();
        let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        raw.into_iter().map(|x| x / norm).collect()
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);

        let mut decision = make_decision("auth_strategy", "use JWT", 1_700_000_000_000);
        decision.refined_from = Some(vec!["decision_a_1_aaaa".to_string()]);
        decision.evidence = Some("\"benchmarks\"".to_string());
        store.insert_decision(&decision, None, "test-model").unwrap();

        let loaded = store.get(&decision.id).unwrap().unwrap();
        assert_eq!(loaded.topic, "auth_strategy");
        assert_eq!(loaded.decision, "use JWT");
        assert_eq!(loaded.refined_from, decision.refined_from);
        assert_eq!(loaded.evidence.as_deref(), Some("\"benchmarks\""));
        assert_eq!(loaded.created_at, 1_700_000_000_000);
        assert!(loaded.outcome.is_none());
    }

    #[test]
    fn test_get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        assert!(store.get("decision_nope_1_aaaa").unwrap().is_none());
    }

    #[test]
    fn test_current_for_topic_skips_superseded() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);

        let old = make_decision("caching", "memcached", 1_700_000_000_000);
        let mut new = make_decision("caching", "redis", 1_700_000_100_000);
        new.supersedes = Some(old.id.clone());
        store.insert_decision(&old, None, "m").unwrap();
        store.insert_decision(&new, None, "m").unwrap();
        store.mark_superseded(&old.id, &new.id, 1_700_000_100_000).unwrap();

        let current = store.current_for_topic("caching").unwrap().unwrap();
        assert_eq!(current.id, new.id);
    }

    #[test]
    fn test_mark_superseded_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);

        let a = make_decision("t", "a", 1);
        store.insert_decision(&a, None, "m").unwrap();
        assert!(store.mark_superseded(&a.id, "decision_x_1_aaaa", 2).unwrap());
        // Already set: the second transition is refused
        assert!(!store.mark_superseded(&a.id, "decision_y_1_bbbb", 3).unwrap());
        let loaded = store.get(&a.id).unwrap().unwrap();
        assert_eq!(loaded.superseded_by.as_deref(), Some("decision_x_1_aaaa"));
    }

    #[test]
    fn test_chain_walk() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);

        let first = make_decision("db", "postgres", 1_000);
        let mut second = make_decision("db", "postgres+pgbouncer", 2_000);
        second.supersedes = Some(first.id.clone());
        let mut third = make_decision("db", "cockroach", 3_000);
        third.supersedes = Some(second.id.clone());

        for d in [&first, &second, &third] {
            store.insert_decision(d, None, "m").unwrap();
        }
        store.mark_superseded(&first.id, &second.id, 2_000).unwrap();
        store.mark_superseded(&second.id, &third.id, 3_000).unwrap();

        let head = store.current_for_topic("db").unwrap().unwrap();
        let chain = store.chain_from(head).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].id, third.id);
        assert_eq!(chain[2].id, first.id);

        // full_chain from the middle walks up then down
        let full = store.full_chain(&second.id).unwrap();
        assert_eq!(full.len(), 3);
        assert_eq!(full[0].id, third.id);
    }

    #[test]
    fn test_self_edge_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t", "a", 1);
        store.insert_decision(&a, None, "m").unwrap();

        let edge = NewEdge::auto(&a.id, &a.id, Relationship::Refines, 1);
        let err = store.ensure_edge(&edge).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn test_edge_round_trip_and_approval_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t1", "a", 1);
        let b = make_decision("t2", "b", 2);
        store.insert_decision(&a, None, "m").unwrap();
        store.insert_decision(&b, None, "m").unwrap();

        store
            .ensure_edge(&NewEdge::auto(&a.id, &b.id, Relationship::Refines, 3))
            .unwrap();
        let mut pending = NewEdge::auto(&a.id, &b.id, Relationship::Debates, 4);
        pending.approved_by_user = Some(false);
        pending.created_by = CreatedBy::User;
        store.insert_edge(&pending).unwrap();

        // Pending edges are invisible to graph reads
        let edges = store.edges_touching(&a.id).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relationship, Relationship::Refines);
        assert_eq!(edges[0].approved_by_user, Some(true));
        assert!(edges[0].approved_at.is_some());
    }

    #[test]
    fn test_ensure_edge_ignores_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t1", "a", 1);
        let b = make_decision("t2", "b", 2);
        store.insert_decision(&a, None, "m").unwrap();
        store.insert_decision(&b, None, "m").unwrap();

        let edge = NewEdge::auto(&a.id, &b.id, Relationship::BuildsOn, 3);
        store.ensure_edge(&edge).unwrap();
        store.ensure_edge(&edge).unwrap();
        assert_eq!(store.edges_touching(&a.id).unwrap().len(), 1);
    }

    #[test]
    fn test_keyword_search_tokens_and_superseded_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);

        let railway = make_decision("deploy_railway", "mount a Railway volume", 2_000);
        let mut old = make_decision("deploy_railway_old", "old railway approach", 1_000);
        old.superseded_by = Some(railway.id.clone());
        let unrelated = make_decision("frontend", "use svelte", 3_000);
        for d in [&railway, &old, &unrelated] {
            store.insert_decision(d, None, "m").unwrap();
        }

        let hits = store.keyword_search("Railway Volume", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, railway.id);

        // LIKE wildcards in the query must not act as wildcards
        let hits = store.keyword_search("%", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_keyword_search_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("alpha", "shared keyword", 1_000);
        let b = make_decision("beta", "shared keyword", 2_000);
        store.insert_decision(&a, None, "m").unwrap();
        store.insert_decision(&b, None, "m").unwrap();

        let hits = store.keyword_search("shared", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, b.id);
    }

    #[cfg(feature = "vector-search")]
    #[test]
    fn test_vector_round_trip_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        assert!(store.vector_search_enabled());

        let a = make_decision("t1", "a", 1);
        let b = make_decision("t2", "b", 2);
        store.insert_decision(&a, Some(&unit_vector(0)), "m").unwrap();
        store.insert_decision(&b, Some(&unit_vector(40)), "m").unwrap();

        let stored = store.embedding_for(&a.id).unwrap().unwrap();
        assert_eq!(stored.len(), TEST_DIM);

        let hits = store.vector_search(&unit_vector(0), 2).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].0.id, a.id);
        assert!(hits[0].1 > 0.99);
    }

    #[cfg(feature = "vector-search")]
    #[test]
    fn test_index_rebuilt_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let a = make_decision("t1", "a", 1);
        {
            let store = open_store(&dir, true);
            store.insert_decision(&a, Some(&unit_vector(3)), "m").unwrap();
        }

        let store = open_store(&dir, true);
        let hits = store.vector_search(&unit_vector(3), 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, a.id);
    }

    #[test]
    fn test_vector_disabled_degrades_silently() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        assert!(!store.vector_search_enabled());

        let a = make_decision("t1", "a", 1);
        // Vector supplied but unavailable: row saved, vector dropped
        store.insert_decision(&a, Some(&unit_vector(0)), "m").unwrap();
        assert!(store.get(&a.id).unwrap().is_some());
        assert!(store.embedding_for(&a.id).unwrap().is_none());
        assert!(store.vector_search(&unit_vector(0), 5).unwrap().is_empty());
    }

    #[test]
    fn test_insert_rejects_wrong_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t1", "a", 1);
        let err = store
            .insert_decision(&a, Some(&[1.0, 2.0]), "m")
            .unwrap_err();
        assert_eq!(err.code(), "EMBEDDING_ERROR");
    }

    #[test]
    fn test_update_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t1", "a", 1);
        store.insert_decision(&a, None, "m").unwrap();

        store
            .update_outcome(&a.id, Outcome::Failed, Some("tests fail"), None, 5)
            .unwrap();
        let loaded = store.get(&a.id).unwrap().unwrap();
        assert_eq!(loaded.outcome, Some(Outcome::Failed));
        assert_eq!(loaded.failure_reason.as_deref(), Some("tests fail"));
        assert_eq!(loaded.updated_at, 5);

        let err = store
            .update_outcome("decision_missing_1_aaaa", Outcome::Success, None, None, 5)
            .unwrap_err();
        assert_eq!(err.code(), "DECISION_NOT_FOUND");
    }

    #[test]
    fn test_record_usage() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t1", "a", 1);
        store.insert_decision(&a, None, "m").unwrap();

        store.record_usage(&a.id, true, 2).unwrap();
        store.record_usage(&a.id, true, 3).unwrap();
        store.record_usage(&a.id, false, 4).unwrap();

        let loaded = store.get(&a.id).unwrap().unwrap();
        assert_eq!(loaded.usage_count, 3);
        assert_eq!(loaded.usage_success, 2);
        assert_eq!(loaded.usage_failure, 1);
    }

    #[test]
    fn test_latest_unresolved_for_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);

        let mut early = make_decision("t1", "a", 1_000);
        early.session_id = Some("s".to_string());
        let mut late = make_decision("t2", "b", 2_000);
        late.session_id = Some("s".to_string());
        let mut resolved = make_decision("t3", "c", 3_000);
        resolved.session_id = Some("s".to_string());
        resolved.outcome = Some(Outcome::Success);

        for d in [&early, &late, &resolved] {
            store.insert_decision(d, None, "m").unwrap();
        }

        let found = store.latest_unresolved_for_session("s", 0).unwrap().unwrap();
        assert_eq!(found.id, late.id);

        // Window excludes decisions created before since_ms
        assert!(store
            .latest_unresolved_for_session("s", 2_500)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_pending_link_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t1", "a", 1);
        let b = make_decision("t2", "b", 2);
        store.insert_decision(&a, None, "m").unwrap();
        store.insert_decision(&b, None, "m").unwrap();

        let mut proposal = NewEdge::auto(&a.id, &b.id, Relationship::Contradicts, 3);
        proposal.approved_by_user = Some(false);
        proposal.created_by = CreatedBy::User;
        let link_id = store.insert_edge(&proposal).unwrap();

        assert_eq!(store.pending_links().unwrap().len(), 1);

        store.approve_link(link_id, 10).unwrap();
        assert!(store.pending_links().unwrap().is_empty());
        let edges = store.edges_touching(&a.id).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].approved_at, Some(10));

        // Approving again: no longer pending
        let err = store.approve_link(link_id, 11).unwrap_err();
        assert_eq!(err.code(), "LINK_NOT_FOUND");
    }

    #[test]
    fn test_reject_link_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t1", "a", 1);
        let b = make_decision("t2", "b", 2);
        store.insert_decision(&a, None, "m").unwrap();
        store.insert_decision(&b, None, "m").unwrap();

        let mut proposal = NewEdge::auto(&a.id, &b.id, Relationship::Debates, 3);
        proposal.approved_by_user = Some(false);
        let link_id = store.insert_edge(&proposal).unwrap();

        store.reject_link(link_id).unwrap();
        assert!(store.pending_links().unwrap().is_empty());
        assert!(store.edges_touching(&a.id).unwrap().is_empty());
        assert!(matches!(
            store.reject_link(link_id),
            Err(MemoryError::LinkNotFound(_))
        ));
    }

    #[test]
    fn test_reconcile_repairs_missing_back_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("mama.db");
        let old_id;
        let new_id;
        {
            let store = DecisionStore::open(&db_path, TEST_DIM, false).unwrap();
            let old = make_decision("t", "old", 1_000);
            let mut new = make_decision("t", "new", 2_000);
            new.supersedes = Some(old.id.clone());
            store.insert_decision(&old, None, "m").unwrap();
            // Simulated crash: the new row is committed, edge and
            // back-pointer never were
            store.insert_decision(&new, None, "m").unwrap();
            old_id = old.id;
            new_id = new.id;
        }

        let store = DecisionStore::open(&db_path, TEST_DIM, false).unwrap();
        let old = store.get(&old_id).unwrap().unwrap();
        assert_eq!(old.superseded_by.as_deref(), Some(new_id.as_str()));

        // The supersedes edge was re-created
        let conn = store.lock_conn().unwrap();
        let edges: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM decision_edges
                 WHERE from_id = ?1 AND to_id = ?2 AND relationship = 'supersedes'",
                params![new_id, old_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(edges, 1);
    }

    #[test]
    fn test_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, false);
        let a = make_decision("t1", "a", 1);
        let b = make_decision("t2", "b", 2);
        store.insert_decision(&a, None, "m").unwrap();
        store.insert_decision(&b, None, "m").unwrap();
        store
            .ensure_edge(&NewEdge::auto(&a.id, &b.id, Relationship::Refines, 3))
            .unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.total_decisions, 2);
        assert_eq!(counts.active_decisions, 2);
        assert_eq!(counts.total_edges, 1);
        assert_eq!(counts.pending_links, 0);
        assert_eq!(counts.embeddings_stored, 0);

        let by_type = store.edge_type_counts().unwrap();
        assert_eq!(by_type, vec![("refines".to_string(), 1)]);
    }
}
