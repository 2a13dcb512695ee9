//! Decision domain model
//!
//! A decision is an immutable-once-written record of a technical choice.
//! After insert, only its outcome, supersede back-pointer, usage counters,
//! confidence, and `updated_at` may change.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MemoryError, Result};

// ============================================================================
// OUTCOME
// ============================================================================

/// Outcome of a decision once feedback exists. Absent outcome means the
/// decision is still ongoing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// The decision worked out
    Success,
    /// The decision failed
    Failed,
    /// The decision partially worked
    Partial,
}

impl Outcome {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failed => "FAILED",
            Outcome::Partial => "PARTIAL",
        }
    }

    /// Parse case-insensitively; anything else is a validation error.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "SUCCESS" => Ok(Outcome::Success),
            "FAILED" => Ok(Outcome::Failed),
            "PARTIAL" => Ok(Outcome::Partial),
            other => Err(MemoryError::validation_field(
                format!("Illegal outcome value: {other}"),
                "outcome",
                other,
            )),
        }
    }

    /// Importance weight used by the relevance scorer. Failures matter most
    /// when assembling context.
    pub fn importance(outcome: Option<Outcome>) -> f64 {
        match outcome {
            Some(Outcome::Failed) => 1.0,
            Some(Outcome::Partial) => 0.7,
            Some(Outcome::Success) => 0.5,
            None => 0.3,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// DECISION
// ============================================================================

/// A decision record
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Stable unique identifier: `decision_<topic>_<ms>_<random4>`
    pub id: String,
    /// Short snake_case classifier
    pub topic: String,
    /// The choice made
    pub decision: String,
    /// Explanation; may contain inline `builds_on:`/`debates:`/`synthesizes:`
    /// references to other decision ids
    pub reasoning: String,
    /// Outcome once known; `None` = ongoing
    pub outcome: Option<Outcome>,
    /// Why it failed (set with a FAILED outcome)
    pub failure_reason: Option<String>,
    /// Known limitation (set with a PARTIAL outcome)
    pub limitation: Option<String>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Id of the decision this one replaces
    pub supersedes: Option<String>,
    /// Id of the decision replacing this one; transitions unset → set once
    pub superseded_by: Option<String>,
    /// Ordered parent ids for multi-parent refinement
    pub refined_from: Option<Vec<String>>,
    /// Creation time, milliseconds since epoch
    pub created_at: i64,
    /// Last mutation time, milliseconds since epoch
    pub updated_at: i64,
    /// Session that produced the decision
    pub session_id: Option<String>,
    /// How involved the user was (free-form provenance)
    pub user_involvement: Option<String>,
    /// Supporting evidence, serialized JSON
    pub evidence: Option<String>,
    /// Alternatives considered, serialized JSON
    pub alternatives: Option<String>,
    /// Known risks
    pub risks: Option<String>,
    /// Structured provenance payload, opaque to the engine
    pub trust_context: Option<String>,
    /// Times applying this decision succeeded
    pub usage_success: i64,
    /// Times applying this decision failed
    pub usage_failure: i64,
    /// Times this decision was applied
    pub usage_count: i64,
    /// Estimated time saved by reusing this decision, in hours
    pub time_saved: f64,
    /// Whether this decision is flagged for re-validation
    pub needs_validation: bool,
    /// How many validation passes ran
    pub validation_attempts: i64,
    /// Last validation time, milliseconds since epoch
    pub last_validated_at: Option<i64>,
}

impl Decision {
    /// Age in whole-ish days relative to `now_ms`.
    pub fn age_days(&self, now_ms: i64) -> f64 {
        (now_ms - self.created_at).max(0) as f64 / 86_400_000.0
    }

    /// Canonical textual serialization fed to the embedding model.
    ///
    /// Field order is fixed; optional sections appear only when present so
    /// two decisions differing only in absent fields embed differently.
    pub fn enriched_text(&self) -> String {
        let outcome = self
            .outcome
            .map(|o| o.as_str().to_string())
            .unwrap_or_else(|| "ongoing".to_string());
        let involvement = self.user_involvement.as_deref().unwrap_or("unknown");

        let mut text = format!(
            "Topic: {}\nDecision: {}\nReasoning: {}\nOutcome: {}\nConfidence: {}\nUser Involvement: {}",
            self.topic, self.decision, self.reasoning, outcome, self.confidence, involvement
        );
        if let Some(evidence) = &self.evidence {
            text.push_str(&format!("\nEvidence: {evidence}"));
        }
        if let Some(alternatives) = &self.alternatives {
            text.push_str(&format!("\nAlternatives: {alternatives}"));
        }
        if let Some(risks) = &self.risks {
            text.push_str(&format!("\nRisks: {risks}"));
        }
        text
    }
}

// ============================================================================
// ID GENERATION
// ============================================================================

/// Generate a decision id: `decision_<sanitized_topic>_<ms>_<random4>`.
pub fn generate_decision_id(topic: &str, now_ms: i64) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!(
        "decision_{}_{}_{}",
        sanitize_topic(topic),
        now_ms,
        &salt[..4]
    )
}

/// Lowercase, non-alphanumerics collapsed to single underscores.
pub fn sanitize_topic(topic: &str) -> String {
    let mut out = String::with_capacity(topic.len());
    let mut last_underscore = true;
    for c in topic.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("untitled");
    }
    out
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for saving a new decision
///
/// Uses `deny_unknown_fields` to prevent field injection from loosely-typed
/// front-ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaveInput {
    /// Topic classifier (snake_case)
    pub topic: String,
    /// The choice made
    pub decision: String,
    /// Explanation; inline references create typed edges
    pub reasoning: String,
    /// Confidence in [0, 1]; defaults to 0.5
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Known outcome at save time (rare; normally attached later)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Why it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Known limitation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limitation: Option<String>,
    /// Structured provenance payload (opaque)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_context: Option<serde_json::Value>,
    /// Parent ids for multi-parent refinement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined_from: Option<Vec<String>>,
    /// Session provenance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// User involvement provenance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_involvement: Option<String>,
    /// Supporting evidence (string or list)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
    /// Alternatives considered (string or list)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<serde_json::Value>,
    /// Known risks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risks: Option<String>,
}

impl SaveInput {
    /// Minimal constructor for the common save path.
    pub fn new(
        topic: impl Into<String>,
        decision: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            decision: decision.into(),
            reasoning: reasoning.into(),
            confidence: None,
            outcome: None,
            failure_reason: None,
            limitation: None,
            trust_context: None,
            refined_from: None,
            session_id: None,
            user_involvement: None,
            evidence: None,
            alternatives: None,
            risks: None,
        }
    }

    /// Builder-style confidence setter.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Builder-style session setter.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Validate required fields and ranges.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(MemoryError::validation_field(
                "topic must not be empty",
                "topic",
                "empty",
            ));
        }
        if self.decision.trim().is_empty() {
            return Err(MemoryError::validation_field(
                "decision must not be empty",
                "decision",
                "empty",
            ));
        }
        if self.reasoning.trim().is_empty() {
            return Err(MemoryError::validation_field(
                "reasoning must not be empty",
                "reasoning",
                "empty",
            ));
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) || !confidence.is_finite() {
                return Err(MemoryError::validation_field(
                    "confidence must be in [0, 1]",
                    "confidence",
                    confidence.to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Input for updating a decision's outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutcomeUpdate {
    /// New outcome; normalized case-insensitively
    pub outcome: String,
    /// Why it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Known limitation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limitation: Option<String>,
}

// ============================================================================
// SAVE REPORT
// ============================================================================

/// Result of a successful save
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    /// Id of the new decision
    pub id: String,
    /// Existing decisions semantically close to the new one (other topics)
    pub similar_decisions: Vec<SimilarDecision>,
    /// Advisory, e.g. confidence dropped relative to the superseded decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Hint about the supersede linkage for collaborating front-ends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaboration_hint: Option<String>,
    /// Edges created from parsed reasoning references
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_graph: Option<ReasoningGraph>,
}

/// A semantically similar existing decision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarDecision {
    /// Decision id
    pub id: String,
    /// Its topic
    pub topic: String,
    /// Its decision text
    pub decision: String,
    /// Cosine similarity to the new decision
    pub similarity: f32,
}

/// Summary of edges created from reasoning references
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningGraph {
    /// Edges that were created
    pub edges_created: Vec<CreatedEdge>,
    /// Referenced ids that do not exist (logged and skipped)
    pub missing_references: Vec<String>,
}

/// A single created reasoning edge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEdge {
    /// Target decision id
    pub to_id: String,
    /// Edge relationship
    pub relationship: crate::graph::Relationship,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_parse_case_insensitive() {
        assert_eq!(Outcome::parse("success").unwrap(), Outcome::Success);
        assert_eq!(Outcome::parse("FAILED").unwrap(), Outcome::Failed);
        assert_eq!(Outcome::parse(" Partial ").unwrap(), Outcome::Partial);
        assert!(Outcome::parse("unknown").is_err());
    }

    #[test]
    fn test_outcome_importance() {
        assert_eq!(Outcome::importance(Some(Outcome::Failed)), 1.0);
        assert_eq!(Outcome::importance(Some(Outcome::Partial)), 0.7);
        assert_eq!(Outcome::importance(Some(Outcome::Success)), 0.5);
        assert_eq!(Outcome::importance(None), 0.3);
    }

    #[test]
    fn test_sanitize_topic() {
        assert_eq!(sanitize_topic("Auth Strategy"), "auth_strategy");
        assert_eq!(sanitize_topic("db//pool--size!"), "db_pool_size");
        assert_eq!(sanitize_topic("___"), "untitled");
        assert_eq!(sanitize_topic("CamelCase"), "camelcase");
    }

    #[test]
    fn test_generate_decision_id_shape() {
        let id = generate_decision_id("auth strategy", 1_700_000_000_000);
        assert!(id.starts_with("decision_auth_strategy_1700000000000_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 4);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_decision_id("topic", 1);
        let b = generate_decision_id("topic", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_save_input_validation() {
        assert!(SaveInput::new("t", "d", "r").validate().is_ok());
        assert!(SaveInput::new("", "d", "r").validate().is_err());
        assert!(SaveInput::new("t", "  ", "r").validate().is_err());
        assert!(SaveInput::new("t", "d", "r")
            .with_confidence(1.5)
            .validate()
            .is_err());
        assert!(SaveInput::new("t", "d", "r")
            .with_confidence(-0.1)
            .validate()
            .is_err());
        assert!(SaveInput::new("t", "d", "r")
            .with_confidence(1.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_save_input_deny_unknown_fields() {
        let json = r#"{"topic": "t", "decision": "d", "reasoning": "r"}"#;
        assert!(serde_json::from_str::<SaveInput>(json).is_ok());

        let json = r#"{"topic": "t", "decision": "d", "reasoning": "r", "rogue": 1}"#;
        assert!(serde_json::from_str::<SaveInput>(json).is_err());
    }

    #[test]
    fn test_enriched_text_field_order() {
        let decision = Decision {
            id: "decision_t_1_abcd".into(),
            topic: "t".into(),
            decision: "use X".into(),
            reasoning: "because".into(),
            outcome: None,
            failure_reason: None,
            limitation: None,
            confidence: 0.7,
            supersedes: None,
            superseded_by: None,
            refined_from: None,
            created_at: 0,
            updated_at: 0,
            session_id: None,
            user_involvement: Some("collaborative".into()),
            evidence: Some("\"benchmarks\"".into()),
            alternatives: None,
            risks: Some("lock-in".into()),
            trust_context: None,
            usage_success: 0,
            usage_failure: 0,
            usage_count: 0,
            time_saved: 0.0,
            needs_validation: false,
            validation_attempts: 0,
            last_validated_at: None,
        };

        let text = decision.enriched_text();
        let topic_pos = text.find("Topic:").unwrap();
        let decision_pos = text.find("Decision:").unwrap();
        let reasoning_pos = text.find("Reasoning:").unwrap();
        let outcome_pos = text.find("Outcome: ongoing").unwrap();
        let confidence_pos = text.find("Confidence: 0.7").unwrap();
        let involvement_pos = text.find("User Involvement: collaborative").unwrap();
        let evidence_pos = text.find("Evidence:").unwrap();
        let risks_pos = text.find("Risks:").unwrap();

        assert!(topic_pos < decision_pos);
        assert!(decision_pos < reasoning_pos);
        assert!(reasoning_pos < outcome_pos);
        assert!(outcome_pos < confidence_pos);
        assert!(confidence_pos < involvement_pos);
        assert!(involvement_pos < evidence_pos);
        assert!(evidence_pos < risks_pos);
        assert!(!text.contains("Alternatives:"));
    }
}
