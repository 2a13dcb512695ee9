//! Outcome tracking
//!
//! Classifies free-text user feedback into an outcome and attaches it to
//! the most recent undecided decision of the current session. Confidence
//! evolves with the outcome: failures cost more than successes earn, and a
//! success that survived a month earns a longevity bonus.

use serde::{Deserialize, Serialize};

use crate::decision::Outcome;
use crate::error::Result;
use crate::storage::DecisionStore;

/// Only decisions created within this window are eligible for feedback
const FEEDBACK_WINDOW_MS: i64 = 3_600_000;

/// Maximum stored failure-reason length
const FAILURE_REASON_MAX_CHARS: usize = 200;

/// Confidence delta for a success
const SUCCESS_IMPACT: f64 = 0.2;

/// Extra confidence for a success at least this old, in days
const LONGEVITY_BONUS: f64 = 0.1;
const LONGEVITY_THRESHOLD_DAYS: f64 = 30.0;

/// Confidence delta for a failure
const FAILURE_IMPACT: f64 = -0.3;

/// Confidence delta for a partial outcome
const PARTIAL_IMPACT: f64 = 0.1;

const FAILURE_PATTERNS: &[&str] = &[
    "doesn't work",
    "failed",
    "error",
    "slow",
    "broken",
    "bug",
    "wrong",
    "not working",
];

const SUCCESS_PATTERNS: &[&str] = &[
    "works", "perfect", "great", "success", "excellent", "fast", "good",
];

const PARTIAL_PATTERNS: &[&str] = &["okay", "acceptable", "improved", "better"];

/// What the tracker did with a piece of feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeFeedback {
    /// Decision the outcome was attached to
    pub decision_id: String,
    /// Classified outcome
    pub outcome: Outcome,
    /// Days between the decision and the feedback, 2 decimals
    pub duration_days: f64,
    /// Confidence before the update
    pub confidence_before: f64,
    /// Confidence after the update, clamped to [0, 1]
    pub confidence_after: f64,
    /// Stored failure reason, for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Heuristic outcome classifier and confidence updater
#[derive(Debug, Default, Clone, Copy)]
pub struct OutcomeTracker;

impl OutcomeTracker {
    /// Classify a user message. Failure patterns are checked first so
    /// "doesn't work, was working before" reads as a failure.
    pub fn classify(message: &str) -> Option<Outcome> {
        let lower = message.to_lowercase();
        if FAILURE_PATTERNS.iter().any(|p| lower.contains(p)) {
            return Some(Outcome::Failed);
        }
        if SUCCESS_PATTERNS.iter().any(|p| lower.contains(p)) {
            return Some(Outcome::Success);
        }
        if PARTIAL_PATTERNS.iter().any(|p| lower.contains(p)) {
            return Some(Outcome::Partial);
        }
        None
    }

    /// First sentence of a message, capped at 200 chars.
    pub fn first_sentence(message: &str) -> String {
        let trimmed = message.trim();
        let end = trimmed
            .char_indices()
            .find(|(_, c)| matches!(c, '.' | '!' | '?' | '\n'))
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len());
        let sentence = trimmed[..end].trim();
        sentence.chars().take(FAILURE_REASON_MAX_CHARS).collect()
    }

    /// Confidence delta for an outcome observed `duration_days` after the
    /// decision.
    pub fn impact(outcome: Outcome, duration_days: f64) -> f64 {
        match outcome {
            Outcome::Success => {
                if duration_days >= LONGEVITY_THRESHOLD_DAYS {
                    SUCCESS_IMPACT + LONGEVITY_BONUS
                } else {
                    SUCCESS_IMPACT
                }
            }
            Outcome::Failed => FAILURE_IMPACT,
            Outcome::Partial => PARTIAL_IMPACT,
        }
    }

    /// Classify `message` and, when it lands, attach the outcome to the
    /// newest undecided decision of `session_id` created within the last
    /// hour. Double-marking is a no-op; so is feedback with no eligible
    /// decision.
    pub fn track(
        store: &DecisionStore,
        message: &str,
        session_id: &str,
        now_ms: i64,
    ) -> Result<Option<OutcomeFeedback>> {
        let Some(outcome) = Self::classify(message) else {
            return Ok(None);
        };

        let since = now_ms - FEEDBACK_WINDOW_MS;
        let Some(decision) = store.latest_unresolved_for_session(session_id, since)? else {
            tracing::debug!(
                "Feedback classified as {} but no eligible decision in session {}",
                outcome,
                session_id
            );
            return Ok(None);
        };
        if decision.outcome.is_some() {
            return Ok(None);
        }

        let duration_days =
            ((now_ms - decision.created_at) as f64 / 86_400_000.0 * 100.0).round() / 100.0;
        let impact = Self::impact(outcome, duration_days);
        let confidence_after = (decision.confidence + impact).clamp(0.0, 1.0);

        let failure_reason = if outcome == Outcome::Failed {
            Some(Self::first_sentence(message))
        } else {
            None
        };

        store.apply_outcome_feedback(
            &decision.id,
            outcome,
            failure_reason.as_deref(),
            confidence_after,
            outcome == Outcome::Failed,
            now_ms,
        )?;

        tracing::info!(
            "Outcome {} attached to {} (confidence {:.2} -> {:.2})",
            outcome,
            decision.id,
            decision.confidence,
            confidence_after
        );

        Ok(Some(OutcomeFeedback {
            decision_id: decision.id,
            outcome,
            duration_days,
            confidence_before: decision.confidence,
            confidence_after,
            failure_reason,
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{generate_decision_id, Decision};

    #[test]
    fn test_classify_failure() {
        for message in [
            "this doesn't work at all",
            "deployment FAILED again",
            "throws an error on startup",
            "way too slow",
            "the build is broken",
            "found a bug",
            "this is just wrong",
            "it's not working",
        ] {
            assert_eq!(OutcomeTracker::classify(message), Some(Outcome::Failed), "{message}");
        }
    }

    #[test]
    fn test_classify_success() {
        for message in [
            "it works now",
            "perfect, ship it",
            "great result",
            "a real success",
            "excellent latency",
            "this is fast",
            "looks good to me",
        ] {
            assert_eq!(OutcomeTracker::classify(message), Some(Outcome::Success), "{message}");
        }
    }

    #[test]
    fn test_classify_partial() {
        for message in ["it's okay", "acceptable for now", "improved a lot", "better than before"] {
            assert_eq!(OutcomeTracker::classify(message), Some(Outcome::Partial), "{message}");
        }
    }

    #[test]
    fn test_classify_none() {
        assert_eq!(OutcomeTracker::classify("let's look at the config"), None);
        assert_eq!(OutcomeTracker::classify(""), None);
    }

    #[test]
    fn test_failure_beats_success_in_mixed_message() {
        assert_eq!(
            OutcomeTracker::classify("it was working great but now it's broken"),
            Some(Outcome::Failed)
        );
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(
            OutcomeTracker::first_sentence("this doesn't work. tests fail"),
            "this doesn't work"
        );
        assert_eq!(OutcomeTracker::first_sentence("broken!\nmore detail"), "broken");
        let long = "x".repeat(500);
        assert_eq!(OutcomeTracker::first_sentence(&long).chars().count(), 200);
    }

    #[test]
    fn test_impact_values() {
        assert_eq!(OutcomeTracker::impact(Outcome::Success, 1.0), 0.2);
        assert!((OutcomeTracker::impact(Outcome::Success, 31.0) - 0.3).abs() < 1e-12);
        assert_eq!(OutcomeTracker::impact(Outcome::Failed, 1.0), -0.3);
        assert_eq!(OutcomeTracker::impact(Outcome::Partial, 1.0), 0.1);
    }

    fn make_decision(session: &str, created_at: i64, confidence: f64) -> Decision {
        Decision {
            id: generate_decision_id("topic", created_at),
            topic: "topic".to_string(),
            decision: "d".to_string(),
            reasoning: "r".to_string(),
            outcome: None,
            failure_reason: None,
            limitation: None,
            confidence,
            supersedes: None,
            superseded_by: None,
            refined_from: None,
            created_at,
            updated_at: created_at,
            session_id: Some(session.to_string()),
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

    fn open_store(dir: &tempfile::TempDir) -> DecisionStore {
        DecisionStore::open(&dir.path().join("mama.db"), 8, false).unwrap()
    }

    #[test]
    fn test_track_failure_updates_decision() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let now = 1_700_000_000_000;
        let decision = make_decision("s1", now - 600_000, 0.5);
        store.insert_decision(&decision, None, "m").unwrap();

        let feedback = OutcomeTracker::track(&store, "this doesn't work, tests fail", "s1", now)
            .unwrap()
            .unwrap();

        assert_eq!(feedback.decision_id, decision.id);
        assert_eq!(feedback.outcome, Outcome::Failed);
        assert!((feedback.duration_days - 0.01).abs() < 1e-9);
        assert!((feedback.confidence_after - 0.2).abs() < 1e-9);
        assert_eq!(feedback.failure_reason.as_deref(), Some("this doesn't work, tests fail"));

        let stored = store.get(&decision.id).unwrap().unwrap();
        assert_eq!(stored.outcome, Some(Outcome::Failed));
        assert!(stored.needs_validation);
        assert!((stored.confidence - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_track_confidence_clamped_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let now = 1_700_000_000_000;
        let decision = make_decision("s1", now - 1_000, 0.1);
        store.insert_decision(&decision, None, "m").unwrap();

        let feedback = OutcomeTracker::track(&store, "broken", "s1", now)
            .unwrap()
            .unwrap();
        assert_eq!(feedback.confidence_after, 0.0);
    }

    #[test]
    fn test_track_outside_window_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let now = 1_700_000_000_000;
        let decision = make_decision("s1", now - 2 * FEEDBACK_WINDOW_MS, 0.5);
        store.insert_decision(&decision, None, "m").unwrap();

        let feedback = OutcomeTracker::track(&store, "it works", "s1", now).unwrap();
        assert!(feedback.is_none());
        assert!(store.get(&decision.id).unwrap().unwrap().outcome.is_none());
    }

    #[test]
    fn test_double_marking_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let now = 1_700_000_000_000;
        let decision = make_decision("s1", now - 1_000, 0.5);
        store.insert_decision(&decision, None, "m").unwrap();

        assert!(OutcomeTracker::track(&store, "it works", "s1", now)
            .unwrap()
            .is_some());
        // Outcome already set: second classification finds nothing eligible
        assert!(OutcomeTracker::track(&store, "broken now", "s1", now)
            .unwrap()
            .is_none());

        let stored = store.get(&decision.id).unwrap().unwrap();
        assert_eq!(stored.outcome, Some(Outcome::Success));
    }

    #[test]
    fn test_unclassifiable_message_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let now = 1_700_000_000_000;
        let decision = make_decision("s1", now - 1_000, 0.5);
        store.insert_decision(&decision, None, "m").unwrap();

        assert!(OutcomeTracker::track(&store, "thinking about lunch", "s1", now)
            .unwrap()
            .is_none());
    }
}
