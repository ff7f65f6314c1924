//! Append-only, tamper-evident audit log entries.
//!
//! Each entry chains to the previous one via `prev_hash`, so the whole log
//! is verifiable as a sequence rather than row by row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The kind of event recorded in the audit log.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    MemoryRemember,
    MemoryAccess,
    MemoryArchive,
    MemoryUnarchive,
    MemoryForget,
    AccessDenied,
    ConsentDenied,
    DigestEmit,
    TeamCreate,
    TeamJoin,
    TeamLeave,
    TeamDelete,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::MemoryRemember => "memory_remember",
            AuditEventType::MemoryAccess => "memory_access",
            AuditEventType::MemoryArchive => "memory_archive",
            AuditEventType::MemoryUnarchive => "memory_unarchive",
            AuditEventType::MemoryForget => "memory_forget",
            AuditEventType::AccessDenied => "access_denied",
            AuditEventType::ConsentDenied => "consent_denied",
            AuditEventType::DigestEmit => "digest_emit",
            AuditEventType::TeamCreate => "team_create",
            AuditEventType::TeamJoin => "team_join",
            AuditEventType::TeamLeave => "team_leave",
            AuditEventType::TeamDelete => "team_delete",
        }
    }
}

/// One entry in the append-only audit log.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub actor_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub details: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub prev_hash: String,
    pub hash: String,
}

/// The fields that feed the chained hash. Grouped so the dispatcher-facing
/// constructors (`Engine`'s audit helper) don't have to thread eight
/// positional arguments through `compute_hash`/`verify`.
pub struct AuditInput<'a> {
    pub entry_id: &'a str,
    pub timestamp: &'a DateTime<Utc>,
    pub event_type: AuditEventType,
    pub actor_id: &'a str,
    pub subject_id: Option<&'a str>,
    pub team: Option<&'a str>,
    pub record_id: Option<&'a str>,
    pub details: &'a str,
    pub success: bool,
    pub error_code: Option<&'a str>,
    pub prev_hash: &'a str,
}

impl AuditRecord {
    /// Compute the chained hash for a candidate entry given the previous
    /// entry's hash. The entry's own `hash` field is not part of its input.
    pub fn compute_hash(input: &AuditInput<'_>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.entry_id.as_bytes());
        hasher.update(input.timestamp.to_rfc3339().as_bytes());
        hasher.update(input.event_type.as_str().as_bytes());
        hasher.update(input.actor_id.as_bytes());
        hasher.update(input.subject_id.unwrap_or("").as_bytes());
        hasher.update(input.team.unwrap_or("").as_bytes());
        hasher.update(input.record_id.unwrap_or("").as_bytes());
        hasher.update(input.details.as_bytes());
        hasher.update([input.success as u8]);
        hasher.update(input.error_code.unwrap_or("").as_bytes());
        hasher.update(input.prev_hash.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Returns `true` if `self.hash` matches what `compute_hash` would
    /// produce from this entry's own fields. Used to verify chain integrity
    /// entry-by-entry when reading the log back.
    pub fn verify(&self) -> bool {
        let expected = Self::compute_hash(&AuditInput {
            entry_id: &self.entry_id,
            timestamp: &self.timestamp,
            event_type: self.event_type,
            actor_id: &self.actor_id,
            subject_id: self.subject_id.as_deref(),
            team: self.team.as_deref(),
            record_id: self.record_id.as_deref(),
            details: &self.details,
            success: self.success,
            error_code: self.error_code.as_deref(),
            prev_hash: &self.prev_hash,
        });
        expected == self.hash
    }
}

/// Hash used as `prev_hash` for the very first entry in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000";

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input<'a>(ts: &'a DateTime<Utc>) -> AuditInput<'a> {
        AuditInput {
            entry_id: "a1",
            timestamp: ts,
            event_type: AuditEventType::MemoryRemember,
            actor_id: "nyx",
            subject_id: None,
            team: None,
            record_id: Some("r1"),
            details: "stored record",
            success: true,
            error_code: None,
            prev_hash: GENESIS_HASH,
        }
    }

    #[test]
    fn verify_accepts_well_formed_entry() {
        let ts = Utc::now();
        let hash = AuditRecord::compute_hash(&base_input(&ts));
        let entry = AuditRecord {
            entry_id: "a1".into(),
            timestamp: ts,
            event_type: AuditEventType::MemoryRemember,
            actor_id: "nyx".into(),
            subject_id: None,
            team: None,
            record_id: Some("r1".into()),
            details: "stored record".into(),
            success: true,
            error_code: None,
            prev_hash: GENESIS_HASH.into(),
            hash,
        };
        assert!(entry.verify());
    }

    #[test]
    fn verify_rejects_tampered_details() {
        let ts = Utc::now();
        let hash = AuditRecord::compute_hash(&base_input(&ts));
        let mut entry = AuditRecord {
            entry_id: "a1".into(),
            timestamp: ts,
            event_type: AuditEventType::MemoryRemember,
            actor_id: "nyx".into(),
            subject_id: None,
            team: None,
            record_id: Some("r1".into()),
            details: "stored record".into(),
            success: true,
            error_code: None,
            prev_hash: GENESIS_HASH.into(),
            hash,
        };
        entry.details = "tampered".into();
        assert!(!entry.verify());
    }

    #[test]
    fn verify_rejects_wrong_prev_hash() {
        let ts = Utc::now();
        let hash = AuditRecord::compute_hash(&base_input(&ts));
        let mut entry = AuditRecord {
            entry_id: "a1".into(),
            timestamp: ts,
            event_type: AuditEventType::MemoryRemember,
            actor_id: "nyx".into(),
            subject_id: None,
            team: None,
            record_id: Some("r1".into()),
            details: "stored record".into(),
            success: true,
            error_code: None,
            prev_hash: GENESIS_HASH.into(),
            hash,
        };
        entry.prev_hash = "deadbeef".into();
        assert!(!entry.verify());
    }
}
