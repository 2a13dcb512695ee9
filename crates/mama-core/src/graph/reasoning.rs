//! Reasoning reference parsing
//!
//! Reasoning text may carry inline references to other decisions:
//!
//! ```text
//! builds_on: decision_auth_strategy_1700000000000_ab12
//! **debates**: decision_cache_policy_1700000000000_cd34
//! synthesizes: [decision_a_1_aa11, decision_b_2_bb22]
//! ```
//!
//! Patterns accept optional markdown bold markers and both bracketed and
//! bare id lists. Malformed ids are rejected rather than guessed at.

use std::sync::OnceLock;

use regex::Regex;

use crate::graph::Relationship;

/// Longest id accepted from free text
const MAX_ID_LEN: usize = 200;

/// A relationship reference parsed out of reasoning text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    /// Edge type the reference asks for
    pub relationship: Relationship,
    /// Referenced decision id
    pub id: String,
}

fn builds_on_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\*{0,2}builds_on\*{0,2}\s*:\s*([^\n]+)")
            .expect("builds_on pattern is valid")
    })
}

fn debates_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\*{0,2}debates\*{0,2}\s*:\s*([^\n]+)").expect("debates pattern is valid")
    })
}

fn synthesizes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\*{0,2}synthesizes\*{0,2}\s*:\s*(\[[^\]]*\]|[^\n]+)")
            .expect("synthesizes pattern is valid")
    })
}

fn id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"decision_[a-z0-9][a-z0-9_]*").expect("id pattern is valid"))
}

/// Check a candidate id extracted from free text.
///
/// Ids are generated as `decision_<topic>_<ms>_<rand4>`; the tail segments
/// must be present, and the overall shape must be sane.
fn is_well_formed_id(id: &str) -> bool {
    if id.len() > MAX_ID_LEN || id.ends_with('_') || id.contains("__") {
        return false;
    }
    // decision_<at least topic>_<ms digits>_<4 alphanumerics>
    let segments: Vec<&str> = id.split('_').collect();
    if segments.len() < 4 || segments[0] != "decision" {
        return false;
    }
    let suffix = segments[segments.len() - 1];
    let timestamp = segments[segments.len() - 2];
    suffix.len() == 4
        && suffix.chars().all(|c| c.is_ascii_alphanumeric())
        && timestamp.len() >= 10
        && timestamp.chars().all(|c| c.is_ascii_digit())
}

/// Extract every well-formed decision id from a matched tail.
fn extract_ids(tail: &str, relationship: Relationship, out: &mut Vec<ParsedReference>) {
    for m in id_re().find_iter(tail) {
        let id = m.as_str();
        if is_well_formed_id(id) {
            out.push(ParsedReference {
                relationship,
                id: id.to_string(),
            });
        } else {
            tracing::debug!("Skipping malformed decision reference: {}", id);
        }
    }
}

/// Parse all relationship references out of reasoning text.
///
/// `builds_on` and `debates` take the first id on their line; `synthesizes`
/// takes every id in its (bracketed or bare) list. Duplicates are removed
/// preserving first-seen order.
pub fn parse_reasoning_references(reasoning: &str) -> Vec<ParsedReference> {
    let mut refs = Vec::new();

    for capture in builds_on_re().captures_iter(reasoning) {
        let mut found = Vec::new();
        extract_ids(&capture[1], Relationship::BuildsOn, &mut found);
        refs.extend(found.into_iter().take(1));
    }
    for capture in debates_re().captures_iter(reasoning) {
        let mut found = Vec::new();
        extract_ids(&capture[1], Relationship::Debates, &mut found);
        refs.extend(found.into_iter().take(1));
    }
    for capture in synthesizes_re().captures_iter(reasoning) {
        extract_ids(&capture[1], Relationship::Synthesizes, &mut refs);
    }

    let mut seen = std::collections::HashSet::new();
    refs.retain(|r| seen.insert((r.relationship, r.id.clone())));
    refs
}
