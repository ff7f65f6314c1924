//! The memory record — the atomic unit stored in the hot tier.
//!
//! A `#[non_exhaustive]`, `camelCase`-on-the-wire struct, plus a
//! `deny_unknown_fields` input type for the mutating entry point (here,
//! `RememberInput`) so malformed or injected fields are rejected rather
//! than silently ignored.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Maximum number of tags a record may carry.
pub const MAX_TAGS: usize = 10;

/// The kind of thing a memory record represents.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    #[default]
    Interaction,
    Knowledge,
    Decision,
    Experience,
    Reflection,
    Pattern,
    Other,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Interaction => "interaction",
            RecordType::Knowledge => "knowledge",
            RecordType::Decision => "decision",
            RecordType::Experience => "experience",
            RecordType::Reflection => "reflection",
            RecordType::Pattern => "pattern",
            RecordType::Other => "other",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "interaction" => RecordType::Interaction,
            "knowledge" => RecordType::Knowledge,
            "decision" => RecordType::Decision,
            "experience" => RecordType::Experience,
            "reflection" => RecordType::Reflection,
            "pattern" => RecordType::Pattern,
            _ => RecordType::Other,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-record visibility class.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    #[default]
    Private,
    Team,
    Public,
}

impl Isolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Isolation::Private => "private",
            Isolation::Team => "team",
            Isolation::Public => "public",
        }
    }

    /// Parses a wire string. Unknown values are intentionally *not* mapped
    /// to a default here — callers that need "unknown denies" semantics
    /// (access control) must check `parse_name` returned `None`.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "private" => Some(Isolation::Private),
            "team" => Some(Isolation::Team),
            "public" => Some(Isolation::Public),
            _ => None,
        }
    }
}

impl std::fmt::Display for Isolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A memory record — the atomic unit of Katra's hot tier.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub record_id: String,
    pub owner_id: String,
    pub timestamp: DateTime<Utc>,
    pub record_type: RecordType,
    pub importance: f64,
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub isolation: Isolation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,

    #[serde(default)]
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_reason: Option<String>,

    #[serde(default)]
    pub marked_important: bool,
    #[serde(default)]
    pub marked_forgettable: bool,
    /// User-set consolidation override: exempts the record from archival
    /// regardless of age, set/cleared via `update_metadata`.
    #[serde(default)]
    pub archived_not_allowed: bool,

    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,

    #[serde(default)]
    pub emotion_intensity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion_type: Option<String>,

    #[serde(default)]
    pub graph_centrality: f64,
    #[serde(default)]
    pub connection_count: u64,
    #[serde(default)]
    pub connected_record_ids: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_frequency: Option<u64>,
    #[serde(default)]
    pub is_pattern_outlier: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_similarity: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uncertainty: Option<String>,
    #[serde(default)]
    pub related_to: Vec<String>,
}

impl MemoryRecord {
    /// Validates: non-empty content, importance in `[0, 1]`, and a team
    /// name whenever isolation is `Team`.
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(EngineError::InvalidInput("content must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.importance) {
            return Err(EngineError::InvalidInput(format!(
                "importance {} out of range [0,1]",
                self.importance
            )));
        }
        if self.isolation == Isolation::Team && self.team_name.is_none() {
            return Err(EngineError::InvalidInput(
                "team_name is required when isolation is team".into(),
            ));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(EngineError::InvalidInput(format!(
                "at most {} tags are allowed",
                MAX_TAGS
            )));
        }
        Ok(())
    }

    /// Dedup tags (they form a set) and cap at `MAX_TAGS`.
    pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for tag in tags {
            if seen.insert(tag.clone()) {
                out.push(tag);
            }
            if out.len() == MAX_TAGS {
                break;
            }
        }
        out
    }
}

/// Input for `remember`/`learn`/`decide`. Uses `deny_unknown_fields` to
/// reject field-injection attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RememberInput {
    pub content: String,
    #[serde(default)]
    pub record_type: Option<RecordType>,
    #[serde(default)]
    pub importance: Option<f64>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub emotion_intensity: f64,
    #[serde(default)]
    pub emotion_type: Option<String>,
    #[serde(default)]
    pub context_question: Option<String>,
    #[serde(default)]
    pub context_resolution: Option<String>,
    #[serde(default)]
    pub context_uncertainty: Option<String>,
    #[serde(default)]
    pub related_to: Vec<String>,
    #[serde(default)]
    pub marked_important: bool,
}

/// Search mode is always full-text in this implementation; the field exists
/// so the wire shape is stable if a semantic `Grouping`/similarity backend
/// is plugged in later (see `consolidation::Grouping`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecallInput {
    pub topic: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub min_importance: Option<f64>,
    #[serde(default)]
    pub record_type: Option<RecordType>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            record_id: "r1".into(),
            owner_id: "nyx".into(),
            timestamp: now,
            record_type: RecordType::Knowledge,
            importance: 0.5,
            content: "hello".into(),
            response: None,
            context: None,
            component: None,
            session_id: None,
            tags: vec![],
            isolation: Isolation::Private,
            team_name: None,
            archived: false,
            archived_at: None,
            archive_reason: None,
            marked_important: false,
            marked_forgettable: false,
            archived_not_allowed: false,
            last_accessed: now,
            access_count: 0,
            emotion_intensity: 0.0,
            emotion_type: None,
            graph_centrality: 0.0,
            connection_count: 0,
            connected_record_ids: vec![],
            pattern_id: None,
            pattern_frequency: None,
            is_pattern_outlier: false,
            pattern_summary: None,
            semantic_similarity: None,
            context_question: None,
            context_resolution: None,
            context_uncertainty: None,
            related_to: vec![],
        }
    }

    #[test]
    fn rejects_empty_content() {
        let mut r = sample();
        r.content = "  ".into();
        assert!(r.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_importance() {
        let mut r = sample();
        r.importance = -0.001;
        assert!(r.validate().is_err());
        r.importance = 1.001;
        assert!(r.validate().is_err());
        r.importance = 0.0;
        assert!(r.validate().is_ok());
        r.importance = 1.0;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn team_isolation_requires_team_name() {
        let mut r = sample();
        r.isolation = Isolation::Team;
        assert!(r.validate().is_err());
        r.team_name = Some("arch".into());
        assert!(r.validate().is_ok());
    }

    #[test]
    fn tags_are_deduped_and_capped() {
        let tags: Vec<String> = (0..15).map(|i| format!("t{}", i % 3)).collect();
        let normalized = MemoryRecord::normalize_tags(tags);
        assert_eq!(normalized, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let mut r = sample();
        r.tags = vec!["a".into(), "b".into()];
        let line = crate::jsonl::to_line(&r).unwrap();
        let parsed: MemoryRecord = crate::jsonl::from_line(&line).unwrap();
        assert_eq!(parsed.record_id, r.record_id);
        assert_eq!(parsed.tags, r.tags);
        assert_eq!(parsed.importance, r.importance);
    }

    #[test]
    fn unknown_isolation_value_denies() {
        assert_eq!(Isolation::parse_name("bogus"), None);
    }
}
