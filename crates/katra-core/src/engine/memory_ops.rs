//! `remember`/`learn`/`decide`, `recall`, `recent`.

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::hot_tier::QueryFilter;
use crate::index::{IndexRow, RecallFilter};
use crate::memory::{
    AuditEventType, Isolation, MemoryRecord, RecallInput, RecordType, RememberInput,
};
use crate::session::Session;

use super::Engine;

pub struct RememberOutcome {
    pub record: MemoryRecord,
}

pub struct RecallOutcome {
    pub records: Vec<MemoryRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct RecentFilter {
    pub limit: u32,
    pub record_type: Option<RecordType>,
}

/// Copies the index's authoritative mutable fields onto a hot-tier record.
/// The hot tier is append-only, so everything mutated after the initial
/// `remember` (importance, archival, isolation, team, access bookkeeping)
/// lives in the index, not in the record's original JSONL line.
fn apply_index_row(record: &mut MemoryRecord, row: &IndexRow) {
    record.importance = row.importance;
    record.archived = row.archived;
    record.marked_important = row.marked_important;
    record.marked_forgettable = row.marked_forgettable;
    record.archived_not_allowed = row.archived_not_allowed;
    record.emotion_intensity = row.emotion_intensity;
    record.graph_centrality = row.graph_centrality;
    record.last_accessed = row.last_accessed;
    record.access_count = row.access_count;
    record.isolation = row.isolation;
    record.team_name = row.team_name.clone();
}

impl Engine {
    /// `remember`/`learn`/`decide` share this entry point; the dispatcher
    /// picks the default `record_type` per method name before calling in.
    pub fn remember(
        &self,
        session: &mut Session,
        input: RememberInput,
        default_type: RecordType,
        isolation: Isolation,
        team_name: Option<String>,
    ) -> Result<RememberOutcome> {
        if !session.registered {
            return Err(EngineError::InvalidInput("session is not registered".into()));
        }
        let now = Utc::now();
        let record = MemoryRecord {
            record_id: uuid::Uuid::new_v4().to_string(),
            owner_id: session.owner_id.clone(),
            timestamp: now,
            record_type: input.record_type.unwrap_or(default_type),
            importance: input.importance.unwrap_or(0.5),
            content: input.content,
            response: input.response,
            context: input.context,
            component: input.component,
            session_id: None,
            tags: MemoryRecord::normalize_tags(input.tags),
            isolation,
            team_name,
            archived: false,
            archived_at: None,
            archive_reason: None,
            marked_important: input.marked_important,
            marked_forgettable: false,
            archived_not_allowed: false,
            last_accessed: now,
            access_count: 0,
            emotion_intensity: input.emotion_intensity,
            emotion_type: input.emotion_type,
            graph_centrality: 0.0,
            connection_count: 0,
            connected_record_ids: vec![],
            pattern_id: None,
            pattern_frequency: None,
            is_pattern_outlier: false,
            pattern_summary: None,
            semantic_similarity: None,
            context_question: input.context_question,
            context_resolution: input.context_resolution,
            context_uncertainty: input.context_uncertainty,
            related_to: input.related_to,
        };
        record.validate()?;

        self.hot_tier.store(&record)?;
        self.index.upsert(&record)?;
        session.note_stored(record.record_id.clone());

        let _ = self.audit(
            AuditEventType::MemoryRemember,
            &session.owner_id,
            None,
            record.team_name.as_deref(),
            Some(&record.record_id),
            "record stored",
            true,
            None,
        );

        Ok(RememberOutcome { record })
    }

    /// `recall`: full-text match against the index across every owner,
    /// filtered down by the access-control truth table, hydrated from
    /// the hot tier, touching `last_accessed`/`access_count` on every
    /// visited record. Denied matches are audited and dropped
    /// silently from the result, never surfaced as an error.
    pub fn recall(&self, session: &mut Session, requester_id: &str, input: RecallInput) -> Result<RecallOutcome> {
        session.note_query();
        let now = Utc::now();

        let rows = self.index.recall_any_owner(&RecallFilter {
            owner_id: String::new(),
            topic: input.topic,
            min_importance: input.min_importance,
            record_type: input.record_type,
            limit: input.limit.unwrap_or(20),
        })?;

        let mut out = Vec::new();
        for mut row in rows {
            let allowed = self.check_and_audit_access(
                requester_id,
                &row.owner_id,
                &row.record_id,
                row.isolation,
                row.team_name.as_deref(),
            )?;
            if !allowed {
                continue;
            }
            self.index.touch_access(&row.record_id, now)?;
            row.last_accessed = now;
            row.access_count += 1;

            if let Some(mut record) = self.hot_tier_lookup(&row.record_id, row.timestamp)? {
                apply_index_row(&mut record, &row);
                out.push(record);
            }
        }
        Ok(RecallOutcome { records: out })
    }

    /// `recent`: newest-first scan of the requester's own hot tier, no
    /// full-text filter. Archival and metadata overrides are resolved
    /// against the index, since the hot tier's own copy never changes after
    /// the initial write.
    pub fn recent(&self, session: &mut Session, requester_id: &str, filter: RecentFilter) -> Result<RecallOutcome> {
        session.note_query();
        let limit = if filter.limit == 0 { usize::MAX } else { filter.limit as usize };

        let candidates = self.hot_tier.query(&QueryFilter {
            owner_id: requester_id.to_string(),
            record_type: filter.record_type,
            ..Default::default()
        })?;

        let mut out = Vec::new();
        for mut record in candidates {
            if out.len() >= limit {
                break;
            }
            let Some(row) = self.index.get(&record.record_id)? else {
                continue;
            };
            if row.archived {
                continue;
            }
            apply_index_row(&mut record, &row);
            out.push(record);
        }
        Ok(RecallOutcome { records: out })
    }

    /// Scans the hot tier for `record_id`'s original JSONL line, narrowing
    /// by a one-second window around its recorded timestamp.
    fn hot_tier_lookup(&self, record_id: &str, timestamp: chrono::DateTime<Utc>) -> Result<Option<MemoryRecord>> {
        let records = self.hot_tier.query(&QueryFilter {
            owner_id: String::new(),
            since: Some(timestamp - chrono::Duration::seconds(1)),
            until: Some(timestamp + chrono::Duration::seconds(1)),
            ..Default::default()
        })?;
        Ok(records.into_iter().find(|r| r.record_id == record_id))
    }
}
