//! `archive`, `fade`, `forget`, `forget_by_pattern` — the lifecycle verbs
//! exposed outside the scheduled consolidation pipeline.

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::memory::AuditEventType;

use super::Engine;

pub struct ForgetByPatternOutcome {
    pub record_ids: Vec<String>,
    pub dry_run: bool,
}

impl Engine {
    pub fn archive(&self, requester_id: &str, record_id: &str, reason: &str) -> Result<bool> {
        let row = self
            .index
            .get(record_id)?
            .ok_or_else(|| EngineError::NotFound(format!("no such record: {record_id}")))?;
        if row.owner_id != requester_id {
            let _ = self.audit(
                AuditEventType::AccessDenied,
                requester_id,
                Some(&row.owner_id),
                row.team_name.as_deref(),
                Some(record_id),
                "only the owner may archive a record",
                false,
                Some("access_denied"),
            );
            return Err(EngineError::AccessDenied("only the owner may archive a record".into()));
        }

        let changed = self.index.archive(record_id, reason, Utc::now())?;
        let _ = self.audit(
            AuditEventType::MemoryArchive,
            requester_id,
            None,
            row.team_name.as_deref(),
            Some(record_id),
            reason,
            true,
            None,
        );
        Ok(changed)
    }

    pub fn fade(&self, requester_id: &str, record_id: &str, target_importance: f64, reason: &str) -> Result<bool> {
        if !(0.0..=1.0).contains(&target_importance) {
            return Err(EngineError::InvalidInput(format!(
                "target_importance {target_importance} out of range [0,1]"
            )));
        }
        let row = self
            .index
            .get(record_id)?
            .ok_or_else(|| EngineError::NotFound(format!("no such record: {record_id}")))?;
        if row.owner_id != requester_id {
            return Err(EngineError::AccessDenied("only the owner may fade a record".into()));
        }
        let changed = self.index.fade(record_id, target_importance)?;
        let _ = self.audit(
            AuditEventType::MemoryArchive,
            requester_id,
            None,
            row.team_name.as_deref(),
            Some(record_id),
            &format!("faded to importance {target_importance}: {reason}"),
            true,
            None,
        );
        Ok(changed)
    }

    /// `forget(record_id, reason, ci_consent)`: the only erase path —
    /// requires explicit consent, logs the pre-delete content into
    /// `memory_forget_log`, then removes the row from the index and FTS.
    pub fn forget(
        &self,
        requester_id: &str,
        record_id: &str,
        reason: Option<&str>,
        ci_consent: bool,
    ) -> Result<bool> {
        if !ci_consent {
            let _ = self.audit(
                AuditEventType::ConsentDenied,
                requester_id,
                None,
                None,
                Some(record_id),
                "forget requested without explicit consent",
                false,
                Some("consent_denied"),
            );
            return Err(EngineError::ConsentDenied(
                "forget requires ci_consent=true".into(),
            ));
        }
        let (removed, team_name) = self.forget_inner(requester_id, record_id, reason)?;
        let _ = self.audit(
            AuditEventType::MemoryForget,
            requester_id,
            None,
            team_name.as_deref(),
            Some(record_id),
            reason.unwrap_or("forget"),
            true,
            None,
        );
        Ok(removed)
    }

    /// Shared mutation behind `forget` and `forget_by_pattern`, without the
    /// per-call audit row — batch callers write one audit row for the whole
    /// batch instead.
    fn forget_inner(
        &self,
        requester_id: &str,
        record_id: &str,
        reason: Option<&str>,
    ) -> Result<(bool, Option<String>)> {
        let row = self
            .index
            .get(record_id)?
            .ok_or_else(|| EngineError::NotFound(format!("no such record: {record_id}")))?;
        if row.owner_id != requester_id {
            return Err(EngineError::AccessDenied("only the owner may forget a record".into()));
        }

        let content = self
            .hot_tier
            .query(&crate::hot_tier::QueryFilter {
                owner_id: requester_id.to_string(),
                ..Default::default()
            })?
            .into_iter()
            .find(|r| r.record_id == record_id)
            .map(|r| r.content)
            .unwrap_or_default();

        let removed = self.index.forget(record_id, requester_id, &content, reason, Utc::now())?;
        Ok((removed, row.team_name))
    }

    /// `forget_by_pattern`: batch variant. `dry_run=true` only counts
    /// candidates; otherwise every match is forgotten and the batch is
    /// audited as a single row.
    pub fn forget_by_pattern(
        &self,
        requester_id: &str,
        pattern: &str,
        reason: Option<&str>,
        dry_run: bool,
    ) -> Result<ForgetByPatternOutcome> {
        let candidates = self.index.forget_by_pattern_candidates(requester_id, pattern)?;
        if dry_run {
            return Ok(ForgetByPatternOutcome { record_ids: candidates, dry_run: true });
        }

        let mut forgotten = Vec::new();
        for record_id in &candidates {
            if let Ok((true, _)) = self.forget_inner(requester_id, record_id, reason) {
                forgotten.push(record_id.clone());
            }
        }
        let _ = self.audit(
            AuditEventType::MemoryForget,
            requester_id,
            None,
            None,
            None,
            &format!("forget_by_pattern({pattern}) removed {} records", forgotten.len()),
            true,
            None,
        );
        Ok(ForgetByPatternOutcome { record_ids: forgotten, dry_run: false })
    }
}
