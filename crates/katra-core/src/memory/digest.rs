//! Warm-tier digest records — the output of consolidation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// The period a digest summarizes. Also governs `period_id` formatting:
/// `Weekly` uses ISO week form (`2025-W01`), `Monthly` uses `2025-01`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Weekly,
    Monthly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }

    /// Directory name this period type's files live under, relative to
    /// `memory/tier2/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }

    /// Format `instant` as this period type's `period_id`: lexically
    /// sortable, e.g. `2025-W01` or `2025-01`.
    pub fn format_period_id(&self, instant: DateTime<Utc>) -> String {
        match self {
            PeriodType::Weekly => {
                let iso = instant.iso_week();
                format!("{:04}-W{:02}", iso.year(), iso.week())
            }
            PeriodType::Monthly => {
                format!("{:04}-{:02}", instant.year(), instant.month())
            }
        }
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

use chrono::Datelike;

/// Named entities extracted during consolidation and attached to a digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestEntities {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub people: Vec<String>,
}

/// A consolidated summary of a batch of hot-tier records, written to the
/// warm tier by the consolidation pipeline.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestRecord {
    pub digest_id: String,
    pub period_id: String,
    pub period_type: PeriodType,
    /// Free-form label for what produced this digest, e.g. `"consolidation"`
    /// or `"manual"`; mirrors the source's `digest_type` field.
    pub digest_type: String,
    pub timestamp: DateTime<Utc>,
    pub owner_id: String,

    pub source_record_count: u64,
    pub source_tier: String,
    pub source_record_ids: Vec<String>,

    pub summary: String,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub decisions_made: Vec<String>,
    #[serde(default)]
    pub entities: DigestEntities,

    #[serde(default)]
    pub archived: bool,
}

impl DigestRecord {
    pub fn validate(&self) -> Result<()> {
        if self.summary.trim().is_empty() {
            return Err(EngineError::InvalidInput("digest summary must not be empty".into()));
        }
        if self.period_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("digest period_id must not be empty".into()));
        }
        if self.source_record_ids.is_empty() {
            return Err(EngineError::InvalidInput(
                "digest must summarize at least one source record".into(),
            ));
        }
        Ok(())
    }
}

/// Input to explicitly request a digest build outside the scheduled cycle
/// (used by the `consolidation_run` dispatcher method in manual-trigger mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConsolidateInput {
    pub owner_id: String,
    #[serde(default)]
    pub period_type: Option<PeriodType>,
    #[serde(default)]
    pub dry_run: bool,
}
