//! Engine-wide configuration: storage roots, tier caps, and consolidation
//! cadence. The server crate loads these from CLI flags/env/dotenv and hands
//! the resolved struct to [`crate::engine::Engine::open`].

use std::path::PathBuf;

use crate::consolidation::DEFAULT_COMPACTION_THRESHOLD;
use crate::digest_store::DEFAULT_MAX_FILE_BYTES as DEFAULT_DIGEST_FILE_BYTES;
use crate::hot_tier::DEFAULT_MAX_FILE_BYTES as DEFAULT_HOT_TIER_FILE_BYTES;
use crate::mailbox::DEFAULT_QUEUE_CAPACITY;
use crate::memory::PeriodType;

/// Resolved configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Root directory under which `memory/tier1`, `memory/tier2`,
    /// `index.db`, and `audit.jsonl` live.
    pub root: PathBuf,
    pub hot_tier_max_file_bytes: u64,
    pub digest_max_file_bytes: u64,
    pub mailbox_capacity: usize,
    /// Records older than this (and not otherwise exempt) become
    /// consolidation candidates.
    pub max_age_days: i64,
    /// Daily files more than this fraction archived get compacted.
    pub compaction_threshold: f64,
    /// Daily hot-tier files older than this are pruned after consolidation.
    pub retention_days: i64,
    pub digest_period_type: PeriodType,
}

impl CoreConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            hot_tier_max_file_bytes: DEFAULT_HOT_TIER_FILE_BYTES,
            digest_max_file_bytes: DEFAULT_DIGEST_FILE_BYTES,
            mailbox_capacity: DEFAULT_QUEUE_CAPACITY,
            max_age_days: 90,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            retention_days: 365,
            digest_period_type: PeriodType::Weekly,
        }
    }

    pub fn index_db_path(&self) -> PathBuf {
        self.root.join("index.db")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join("audit.jsonl")
    }

    /// Directory holding one `<team_name>.json` mirror file per team.
    pub fn teams_dir(&self) -> PathBuf {
        self.root.join("teams")
    }
}
