//! Record Store (hot tier): append-only daily JSONL files, reverse-
//! chronological scan-based query, per-day file-handle caching.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use lru::LruCache;

use crate::error::{EngineError, Result};
use crate::jsonl;
use crate::memory::{MemoryRecord, RecordType};

/// Default per-day file size cap before `store()` returns `TierFull`.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Number of open daily-file handles the hot tier keeps warm at once.
const HANDLE_CACHE_CAPACITY: usize = 16;

/// Filter accepted by [`HotTier::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Empty means "any owner" — used internally for content hydration
    /// after an access check has already scoped the candidate record.
    pub owner_id: String,
    pub record_type: Option<RecordType>,
    pub min_importance: Option<f64>,
    pub tags: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: u32,
}

impl QueryFilter {
    fn matches(&self, record: &MemoryRecord) -> bool {
        if !self.owner_id.is_empty() && record.owner_id != self.owner_id {
            return false;
        }
        if let Some(rt) = self.record_type {
            if record.record_type != rt {
                return false;
            }
        }
        if let Some(min) = self.min_importance {
            if record.importance < min {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let record_tags: HashSet<&str> = record.tags.iter().map(|t| t.as_str()).collect();
            if !self.tags.iter().all(|t| record_tags.contains(t.as_str())) {
                return false;
            }
        }
        true
    }
}

/// Aggregate counters for [`HotTier::stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TierStats {
    pub record_count: u64,
    pub bytes: u64,
}

/// The append-only hot tier, rooted at `<root>/memory/tier1/`.
pub struct HotTier {
    dir: PathBuf,
    max_file_bytes: u64,
    /// Open writers for the current day's files, keyed by filename stem.
    /// Capped by an LRU so long-running processes don't accumulate one
    /// handle per day forever.
    writers: Mutex<LruCache<String, BufWriter<File>>>,
}

impl HotTier {
    pub fn open(root: &Path, max_file_bytes: u64) -> Result<Self> {
        let dir = root.join("memory").join("tier1");
        jsonl::ensure_dir(&dir)?;
        Ok(Self {
            dir,
            max_file_bytes,
            writers: Mutex::new(LruCache::new(
                NonZeroUsize::new(HANDLE_CACHE_CAPACITY).expect("capacity is non-zero"),
            )),
        })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Appends `record` to its day's file. Returns `TierFull` without
    /// writing a byte if the file is already at or over the size cap.
    pub fn store(&self, record: &MemoryRecord) -> Result<()> {
        let date = record.timestamp.date_naive();
        let path = self.path_for(date);
        let stem = date.format("%Y-%m-%d").to_string();

        let current_size = jsonl::file_size(&path);
        if current_size >= self.max_file_bytes {
            return Err(EngineError::TierFull(format!(
                "daily file {} has reached the {} byte cap",
                stem, self.max_file_bytes
            )));
        }

        let line = jsonl::to_line(record)?;

        let mut writers = self
            .writers
            .lock()
            .map_err(|_| EngineError::Internal("hot tier writer cache poisoned".into()))?;

        if writers.get(&stem).is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            writers.put(stem.clone(), BufWriter::new(file));
        }
        let writer = writers.get_mut(&stem).expect("just inserted");
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Reverse-chronological scan of daily files under `filter.owner_id`'s
    /// prefix, stopping once `filter.limit` records accumulate. A file that
    /// cannot be opened is skipped, not fatal.
    pub fn query(&self, filter: &QueryFilter) -> Result<Vec<MemoryRecord>> {
        self.flush_writers()?;
        let limit = if filter.limit == 0 { usize::MAX } else { filter.limit as usize };
        let files = jsonl::list_jsonl_files_desc(&self.dir)?;
        let mut out = Vec::new();

        for file in files {
            if out.len() >= limit {
                break;
            }
            jsonl::scan_file::<MemoryRecord, _>(&file, |record| {
                if filter.matches(&record) {
                    out.push(record);
                }
                out.len() < limit
            })?;
        }
        Ok(out)
    }

    /// Every record across every owner and every daily file, oldest file
    /// first. Used only by index rebuild, which needs the full hot tier
    /// regardless of tenant.
    pub fn scan_all(&self) -> Result<Vec<MemoryRecord>> {
        self.flush_writers()?;
        let mut files = jsonl::list_jsonl_files_desc(&self.dir)?;
        files.reverse();
        let mut out = Vec::new();
        for file in files {
            jsonl::scan_file::<MemoryRecord, _>(&file, |record| {
                out.push(record);
                true
            })?;
        }
        Ok(out)
    }

    /// `stats(owner_id)`: record count and approximate on-disk bytes across
    /// all daily files for one owner.
    pub fn stats(&self, owner_id: &str) -> Result<TierStats> {
        self.flush_writers()?;
        let files = jsonl::list_jsonl_files_desc(&self.dir)?;
        let mut stats = TierStats::default();

        for file in &files {
            stats.bytes += jsonl::file_size(file);
            jsonl::scan_file::<MemoryRecord, _>(file, |record| {
                if record.owner_id == owner_id {
                    stats.record_count += 1;
                }
                true
            })?;
        }
        Ok(stats)
    }

    /// Rewrites every daily file that is more than `archived_threshold`
    /// fraction archived rows, dropping those rows. `is_archived` resolves
    /// current archived status by `record_id` (the index is authoritative).
    pub fn compact<F>(&self, archived_threshold: f64, mut is_archived: F) -> Result<u64>
    where
        F: FnMut(&str) -> bool,
    {
        self.flush_writers()?;
        let files = jsonl::list_jsonl_files_desc(&self.dir)?;
        let mut compacted = 0;

        for file in files {
            let mut total = 0usize;
            let mut archived = 0usize;
            jsonl::scan_file::<MemoryRecord, _>(&file, |record| {
                total += 1;
                if is_archived(&record.record_id) {
                    archived += 1;
                }
                true
            })?;
            if total == 0 {
                continue;
            }
            let ratio = archived as f64 / total as f64;
            if ratio > archived_threshold {
                jsonl::rewrite_file::<MemoryRecord, _>(&file, |record| {
                    !is_archived(&record.record_id)
                })?;
                compacted += 1;
            }
        }
        Ok(compacted)
    }

    fn flush_writers(&self) -> Result<()> {
        let mut writers = self
            .writers
            .lock()
            .map_err(|_| EngineError::Internal("hot tier writer cache poisoned".into()))?;
        for (_, writer) in writers.iter_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Removes daily files older than `retention_days` relative to `now`.
    /// Used by the retention sweep alongside consolidation.
    pub fn prune_older_than(&self, retention_days: i64, now: DateTime<Utc>) -> Result<u64> {
        self.flush_writers()?;
        let cutoff = now.date_naive() - chrono::Duration::days(retention_days);
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            if date < cutoff {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Isolation;
    use tempfile::TempDir;

    fn sample(owner: &str, content: &str, ts: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord {
            record_id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner.into(),
            timestamp: ts,
            record_type: RecordType::Knowledge,
            importance: 0.5,
            content: content.into(),
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

    #[test]
    fn store_then_query_round_trips() {
        let dir = TempDir::new().unwrap();
        let tier = HotTier::open(dir.path(), DEFAULT_MAX_FILE_BYTES).unwrap();
        let record = sample("nyx", "hello", Utc::now());
        tier.store(&record).unwrap();

        let results = tier
            .query(&QueryFilter {
                owner_id: "nyx".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "hello");
    }

    #[test]
    fn query_respects_owner_isolation() {
        let dir = TempDir::new().unwrap();
        let tier = HotTier::open(dir.path(), DEFAULT_MAX_FILE_BYTES).unwrap();
        tier.store(&sample("nyx", "nyx note", Utc::now())).unwrap();
        tier.store(&sample("echo", "echo note", Utc::now())).unwrap();

        let results = tier
            .query(&QueryFilter {
                owner_id: "nyx".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].owner_id, "nyx");
    }

    #[test]
    fn store_returns_tier_full_when_over_cap() {
        let dir = TempDir::new().unwrap();
        let tier = HotTier::open(dir.path(), 1).unwrap();
        let record = sample("nyx", "first record exceeds one byte", Utc::now());
        tier.store(&record).unwrap();

        let second = sample("nyx", "second", Utc::now());
        let err = tier.store(&second).unwrap_err();
        assert!(matches!(err, EngineError::TierFull(_)));
    }

    #[test]
    fn limit_stops_the_scan_early() {
        let dir = TempDir::new().unwrap();
        let tier = HotTier::open(dir.path(), DEFAULT_MAX_FILE_BYTES).unwrap();
        for i in 0..5 {
            tier.store(&sample("nyx", &format!("note {i}"), Utc::now())).unwrap();
        }
        let results = tier
            .query(&QueryFilter {
                owner_id: "nyx".into(),
                limit: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn prune_removes_files_older_than_retention() {
        let dir = TempDir::new().unwrap();
        let tier = HotTier::open(dir.path(), DEFAULT_MAX_FILE_BYTES).unwrap();
        let old_ts = Utc::now() - chrono::Duration::days(200);
        tier.store(&sample("nyx", "ancient", old_ts)).unwrap();
        tier.store(&sample("nyx", "recent", Utc::now())).unwrap();

        let removed = tier.prune_older_than(90, Utc::now()).unwrap();
        assert_eq!(removed, 1);

        let results = tier
            .query(&QueryFilter {
                owner_id: "nyx".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "recent");
    }
}
