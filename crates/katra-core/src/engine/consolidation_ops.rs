//! `consolidation_run`, `consolidation_insights`, `consolidation_acknowledge`,
//! `memory_digest`.

use chrono::Utc;

use crate::consolidation::{self, ConsolidationReport};
use crate::digest_store::DigestFilter;
use crate::error::{EngineError, Result};
use crate::memory::{AuditEventType, DigestRecord, PeriodType};

use super::Engine;

pub struct ConsolidationRunOutcome {
    pub report: ConsolidationReport,
    pub orphans_recovered: u64,
}

pub struct ConsolidationInsights {
    pub digests: Vec<DigestRecord>,
}

impl Engine {
    /// `consolidation_run(owner_id, dry_run)`: recovers any orphaned
    /// archived rows left by a crash mid-pipeline, then runs one selection
    /// -> grouping -> digest -> disposition pass.
    pub fn consolidation_run(&self, owner_id: &str, dry_run: bool) -> Result<ConsolidationRunOutcome> {
        let orphans_recovered = consolidation::recover_orphans(&self.index, &self.digest_store, owner_id)?;
        if orphans_recovered > 0 {
            let _ = self.audit(
                AuditEventType::MemoryUnarchive,
                owner_id,
                None,
                None,
                None,
                &format!("recovered {orphans_recovered} orphaned record(s) before consolidation"),
                true,
                None,
            );
        }

        let config = self.consolidation_config();
        let grouping = self.grouping();
        let report = consolidation::run(
            &self.hot_tier,
            &self.index,
            &self.digest_store,
            &grouping,
            owner_id,
            &config,
            Utc::now(),
            dry_run,
        )?;

        if !dry_run && report.digests_written > 0 {
            let _ = self.audit(
                AuditEventType::DigestEmit,
                owner_id,
                None,
                None,
                None,
                &format!("wrote {} digest(s)", report.digests_written),
                true,
                None,
            );
        }
        if !dry_run {
            for record_id in &report.archived_record_ids {
                let _ = self.audit(
                    AuditEventType::MemoryArchive,
                    owner_id,
                    None,
                    None,
                    Some(record_id),
                    "consolidation: aged past max_age_days",
                    true,
                    None,
                );
            }
        }

        Ok(ConsolidationRunOutcome { report, orphans_recovered })
    }

    /// `consolidation_insights(owner_id)`: the owner's recent digests,
    /// newest first, read-only. Semantics beyond "recent digests" are
    /// undecided by the wire spec; this returns the last 20 across both
    /// warm-tier periods.
    pub fn consolidation_insights(&self, owner_id: &str) -> Result<ConsolidationInsights> {
        let digests = self.digest_store.query(&DigestFilter {
            owner_id: owner_id.to_string(),
            limit: 20,
            ..Default::default()
        })?;
        Ok(ConsolidationInsights { digests })
    }

    /// `consolidation_acknowledge(owner_id, digest_id)`: marks a digest as
    /// reviewed by the CI. Reuses `DigestRecord.archived` as the
    /// acknowledged flag — a digest has no further lifecycle once written,
    /// so the field is otherwise unused.
    pub fn consolidation_acknowledge(&self, owner_id: &str, digest_id: &str) -> Result<bool> {
        let acknowledged = self.digest_store.acknowledge(digest_id)?;
        if !acknowledged {
            return Err(EngineError::NotFound(format!("no such digest: {digest_id}")));
        }
        let _ = self.audit(
            AuditEventType::DigestEmit,
            owner_id,
            None,
            None,
            None,
            &format!("digest {digest_id} acknowledged"),
            true,
            None,
        );
        Ok(acknowledged)
    }

    /// `memory_digest`: raw warm-tier query, exposed directly for callers
    /// that want a specific period type rather than the last-20 summary.
    pub fn memory_digest(&self, owner_id: &str, period_type: Option<PeriodType>, limit: u32) -> Result<Vec<DigestRecord>> {
        self.digest_store.query(&DigestFilter {
            owner_id: owner_id.to_string(),
            period_type,
            limit,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Isolation, MemoryRecord, RecordType};
    use crate::CoreConfig;
    use tempfile::TempDir;

    fn backdated_record(id: &str, owner: &str, ts: chrono::DateTime<Utc>) -> MemoryRecord {
        MemoryRecord {
            record_id: id.into(),
            owner_id: owner.into(),
            timestamp: ts,
            record_type: RecordType::Interaction,
            importance: 0.3,
            content: format!("note {id}"),
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
            last_accessed: ts,
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

    fn audit_count(engine: &Engine, event_type: AuditEventType) -> usize {
        let mut count = 0;
        crate::jsonl::scan_file::<crate::memory::AuditRecord, _>(&engine.config().audit_log_path(), |entry| {
            if entry.event_type == event_type {
                count += 1;
            }
            true
        })
        .unwrap();
        count
    }

    #[test]
    fn consolidation_audits_one_row_per_archived_record() {
        let root = TempDir::new().unwrap();
        let engine = Engine::open(CoreConfig::new(root.path().to_path_buf())).unwrap();

        let old = Utc::now() - chrono::Duration::days(120);
        for id in ["r1", "r2"] {
            let record = backdated_record(id, "nyx", old);
            engine.hot_tier.store(&record).unwrap();
            engine.index.upsert(&record).unwrap();
        }

        let outcome = engine.consolidation_run("nyx", false).unwrap();
        assert_eq!(outcome.report.records_archived, 2);
        assert_eq!(outcome.report.archived_record_ids.len(), 2);
        assert_eq!(audit_count(&engine, AuditEventType::MemoryArchive), 2);
    }
}
