//! The engine: owns every store and exposes the dispatcher-facing operations
//! as plain methods. The server crate wraps one `Engine` in a `std::sync::Mutex`
//! and serializes every handler body through it — the engine itself
//! assumes single-threaded access and does no internal locking beyond what
//! each store already does for its own readers/writers.

mod consolidation_ops;
mod lifecycle_ops;
mod mailbox_ops;
mod memory_ops;
mod session_ops;
mod team_ops;

pub use consolidation_ops::{ConsolidationInsights, ConsolidationRunOutcome};
pub use lifecycle_ops::ForgetByPatternOutcome;
pub use mailbox_ops::{HearOutcome, HearAllOutcome};
pub use memory_ops::{RecallOutcome, RecentFilter, RememberOutcome};
pub use session_ops::{RegisterOutcome, StatusOutcome};
pub use team_ops::TeamSummary;

use std::path::Path;

use chrono::Utc;

use crate::access::{self, TeamStore};
use crate::config::CoreConfig;
use crate::consolidation::{ConsolidationConfig, NoGrouping};
use crate::digest_store::DigestStore;
use crate::error::{EngineError, Result};
use crate::hot_tier::HotTier;
use crate::index::Index;
use crate::mailbox::Mailbox;
use crate::memory::{AuditEventType, AuditInput, AuditRecord, GENESIS_HASH};
use crate::session::{Registry, Session};

/// The top-level memory engine: one per running process.
pub struct Engine {
    config: CoreConfig,
    pub(crate) hot_tier: HotTier,
    pub(crate) index: Index,
    pub(crate) digest_store: DigestStore,
    pub(crate) mailbox: Mailbox,
    pub(crate) registry: Registry,
    pub(crate) team_store: TeamStore,
    audit: std::sync::Mutex<AuditWriter>,
}

struct AuditWriter {
    path: std::path::PathBuf,
    last_hash: String,
}

impl Engine {
    pub fn open(config: CoreConfig) -> Result<Self> {
        crate::jsonl::ensure_dir(&config.root)?;
        let hot_tier = HotTier::open(&config.root, config.hot_tier_max_file_bytes)?;

        if Index::needs_rebuild(&config.index_db_path())? {
            rebuild_index(&config.root, &config.index_db_path(), &hot_tier)?;
        }
        let index = Index::open(&config.index_db_path())?;
        let digest_store = DigestStore::open(&config.root, config.digest_max_file_bytes)?;
        let mailbox = Mailbox::new(config.mailbox_capacity);
        let registry = Registry::new();
        let team_store = TeamStore::new(config.teams_dir());

        let audit_path = config.audit_log_path();
        let last_hash = last_audit_hash(&audit_path)?;

        Ok(Self {
            config,
            hot_tier,
            index,
            digest_store,
            mailbox,
            registry,
            team_store,
            audit: std::sync::Mutex::new(AuditWriter { path: audit_path, last_hash }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn consolidation_config(&self) -> ConsolidationConfig {
        ConsolidationConfig {
            max_age_days: self.config.max_age_days,
            compaction_threshold: self.config.compaction_threshold,
            period_type: self.config.digest_period_type,
        }
    }

    pub fn grouping(&self) -> NoGrouping {
        NoGrouping
    }

    /// Evaluates the owner/isolation/team truth table for `record_id`,
    /// auditing the outcome either way.
    pub(crate) fn check_and_audit_access(
        &self,
        requester_id: &str,
        owner_id: &str,
        record_id: &str,
        isolation: crate::memory::Isolation,
        team_name: Option<&str>,
    ) -> Result<bool> {
        let decision = access::check_access(&self.index, requester_id, owner_id, isolation, team_name)?;
        match decision {
            access::AccessDecision::Allow => {
                if requester_id != owner_id {
                    let _ = self.audit(AuditEventType::MemoryAccess, requester_id, Some(owner_id), team_name, Some(record_id), "cross-owner read allowed", true, None);
                }
                Ok(true)
            }
            access::AccessDecision::Deny(reason) => {
                let _ = self.audit(AuditEventType::AccessDenied, requester_id, Some(owner_id), team_name, Some(record_id), reason, false, Some("access_denied"));
                Ok(false)
            }
        }
    }

    /// Appends one hash-chained audit entry. Failures are logged and never
    /// propagated — audit is best-effort and must never fail the
    /// originating operation.
    pub(crate) fn audit(
        &self,
        event_type: AuditEventType,
        actor_id: &str,
        subject_id: Option<&str>,
        team: Option<&str>,
        record_id: Option<&str>,
        details: &str,
        success: bool,
        error_code: Option<&str>,
    ) -> Result<()> {
        if let Err(e) = self.audit_inner(event_type, actor_id, subject_id, team, record_id, details, success, error_code) {
            tracing::warn!(error = %e, %actor_id, ?event_type, "audit write failed, continuing");
        }
        Ok(())
    }

    fn audit_inner(
        &self,
        event_type: AuditEventType,
        actor_id: &str,
        subject_id: Option<&str>,
        team: Option<&str>,
        record_id: Option<&str>,
        details: &str,
        success: bool,
        error_code: Option<&str>,
    ) -> Result<()> {
        let mut writer = self
            .audit
            .lock()
            .map_err(|_| EngineError::Internal("audit writer lock poisoned".into()))?;

        let now = Utc::now();
        let entry_id = uuid::Uuid::new_v4().to_string();
        let input = AuditInput {
            entry_id: &entry_id,
            timestamp: &now,
            event_type,
            actor_id,
            subject_id,
            team,
            record_id,
            details,
            success,
            error_code,
            prev_hash: &writer.last_hash,
        };
        let hash = AuditRecord::compute_hash(&input);
        let record = AuditRecord {
            entry_id,
            timestamp: now,
            event_type,
            actor_id: actor_id.to_string(),
            subject_id: subject_id.map(str::to_string),
            team: team.map(str::to_string),
            record_id: record_id.map(str::to_string),
            details: details.to_string(),
            success,
            error_code: error_code.map(str::to_string),
            prev_hash: writer.last_hash.clone(),
            hash: hash.clone(),
        };
        let line = crate::jsonl::to_line(&record)?;
        crate::jsonl::append_line(&writer.path, &line)?;
        writer.last_hash = hash;
        Ok(())
    }

    pub fn new_session(&self) -> Session {
        Session::new(Utc::now())
    }
}

fn rebuild_index(root: &Path, db_path: &Path, hot_tier: &HotTier) -> Result<()> {
    Index::wipe(db_path)?;
    let index = Index::open(db_path)?;
    let records = hot_tier.scan_all()?;
    for record in records {
        index.upsert(&record)?;
    }
    let _ = root;
    Ok(())
}

/// Reads the last line of the audit log to recover the hash chain's tip
/// across restarts, falling back to the genesis sentinel for a fresh log.
fn last_audit_hash(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(GENESIS_HASH.to_string());
    }
    let mut last: Option<AuditRecord> = None;
    crate::jsonl::scan_file::<AuditRecord, _>(path, |entry| {
        last = Some(entry);
        true
    })?;
    Ok(last.map(|e| e.hash).unwrap_or_else(|| GENESIS_HASH.to_string()))
}
