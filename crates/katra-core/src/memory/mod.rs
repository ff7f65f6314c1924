//! Data model: memory records, digests, teams, and audit entries.

pub mod audit;
pub mod digest;
pub mod record;
pub mod team;

pub use audit::{AuditEventType, AuditInput, AuditRecord, GENESIS_HASH};
pub use digest::{ConsolidateInput, DigestEntities, DigestRecord, PeriodType};
pub use record::{Isolation, MemoryRecord, RecallInput, RecordType, RememberInput, MAX_TAGS};
pub use team::{TeamMembershipInput, TeamRecord};
