//! Digest Store (warm tier): append-only weekly/monthly JSONL summaries.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::jsonl;
use crate::memory::{DigestRecord, PeriodType};

/// Default per-file size cap before `append` returns `TierFull`.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Filter accepted by [`DigestStore::query`].
#[derive(Debug, Clone, Default)]
pub struct DigestFilter {
    pub owner_id: String,
    pub period_type: Option<PeriodType>,
    pub theme_substring: Option<String>,
    pub keyword_substring: Option<String>,
    pub limit: u32,
}

impl DigestFilter {
    fn matches(&self, digest: &DigestRecord) -> bool {
        if digest.owner_id != self.owner_id {
            return false;
        }
        if let Some(theme) = &self.theme_substring {
            if !digest.themes.iter().any(|t| t.contains(theme.as_str())) {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword_substring {
            if !digest.keywords.iter().any(|k| k.contains(keyword.as_str())) {
                return false;
            }
        }
        true
    }
}

/// The warm tier, rooted at `<root>/memory/tier2/`.
pub struct DigestStore {
    tier2_dir: PathBuf,
    max_file_bytes: u64,
}

impl DigestStore {
    pub fn open(root: &Path, max_file_bytes: u64) -> Result<Self> {
        let tier2_dir = root.join("memory").join("tier2");
        jsonl::ensure_dir(&tier2_dir.join("weekly"))?;
        jsonl::ensure_dir(&tier2_dir.join("monthly"))?;
        Ok(Self { tier2_dir, max_file_bytes })
    }

    fn path_for(&self, digest: &DigestRecord) -> PathBuf {
        self.tier2_dir
            .join(digest.period_type.dir_name())
            .join(format!("{}.jsonl", digest.period_id))
    }

    /// Appends one digest to its period file. Returns `TierFull` without
    /// writing if the file is already at or over the size cap.
    pub fn append(&self, digest: &DigestRecord) -> Result<()> {
        digest.validate()?;
        let path = self.path_for(digest);
        if jsonl::file_size(&path) >= self.max_file_bytes {
            return Err(EngineError::TierFull(format!(
                "digest file {} has reached the {} byte cap",
                path.display(),
                self.max_file_bytes
            )));
        }
        let line = jsonl::to_line(digest)?;
        jsonl::append_line(&path, &line)?;
        Ok(())
    }

    /// Scans `weekly/` and/or `monthly/` (per `filter.period_type`) newest
    /// files first, filtering by owner and the optional theme/keyword
    /// substrings, capped at `filter.limit` (default ~100).
    pub fn query(&self, filter: &DigestFilter) -> Result<Vec<DigestRecord>> {
        let limit = if filter.limit == 0 { 100 } else { filter.limit as usize };
        let dirs: Vec<&str> = match filter.period_type {
            Some(PeriodType::Weekly) => vec!["weekly"],
            Some(PeriodType::Monthly) => vec!["monthly"],
            None => vec!["weekly", "monthly"],
        };

        let mut out = Vec::new();
        for dir_name in dirs {
            let dir = self.tier2_dir.join(dir_name);
            let files = jsonl::list_jsonl_files_desc(&dir)?;
            for file in files {
                if out.len() >= limit {
                    break;
                }
                jsonl::scan_file::<DigestRecord, _>(&file, |digest| {
                    if filter.matches(&digest) {
                        out.push(digest);
                    }
                    out.len() < limit
                })?;
            }
        }
        Ok(out)
    }

    /// Marks the digest with `digest_id` as acknowledged, rewriting its
    /// period file in place. Returns `false` if no digest matched.
    pub fn acknowledge(&self, digest_id: &str) -> Result<bool> {
        for dir_name in ["weekly", "monthly"] {
            let dir = self.tier2_dir.join(dir_name);
            let files = jsonl::list_jsonl_files_desc(&dir)?;
            for file in files {
                let mut records: Vec<DigestRecord> = Vec::new();
                let mut found = false;
                jsonl::scan_file::<DigestRecord, _>(&file, |mut digest| {
                    if digest.digest_id == digest_id {
                        digest.archived = true;
                        found = true;
                    }
                    records.push(digest);
                    true
                })?;
                if found {
                    let tmp_path = file.with_extension("jsonl.tmp");
                    {
                        let mut tmp = std::fs::File::create(&tmp_path)?;
                        use std::io::Write;
                        for record in &records {
                            tmp.write_all(jsonl::to_line(record)?.as_bytes())?;
                        }
                    }
                    std::fs::rename(&tmp_path, &file)?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DigestEntities;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample(period_id: &str, owner: &str) -> DigestRecord {
        DigestRecord {
            digest_id: uuid::Uuid::new_v4().to_string(),
            period_id: period_id.into(),
            period_type: PeriodType::Weekly,
            digest_type: "consolidation".into(),
            timestamp: Utc::now(),
            owner_id: owner.into(),
            source_record_count: 2,
            source_tier: "tier1".into(),
            source_record_ids: vec!["r1".into(), "r2".into()],
            summary: "a productive week".into(),
            themes: vec!["storage".into()],
            keywords: vec!["jsonl".into()],
            key_insights: vec![],
            decisions_made: vec![],
            entities: DigestEntities::default(),
            archived: false,
        }
    }

    #[test]
    fn append_then_query_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = DigestStore::open(dir.path(), DEFAULT_MAX_FILE_BYTES).unwrap();
        store.append(&sample("2025-W01", "nyx")).unwrap();

        let found = store
            .query(&DigestFilter {
                owner_id: "nyx".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].period_id, "2025-W01");
    }

    #[test]
    fn theme_substring_filters_results() {
        let dir = TempDir::new().unwrap();
        let store = DigestStore::open(dir.path(), DEFAULT_MAX_FILE_BYTES).unwrap();
        store.append(&sample("2025-W01", "nyx")).unwrap();

        let found = store
            .query(&DigestFilter {
                owner_id: "nyx".into(),
                theme_substring: Some("nonexistent".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn rejects_invalid_digest() {
        let dir = TempDir::new().unwrap();
        let store = DigestStore::open(dir.path(), DEFAULT_MAX_FILE_BYTES).unwrap();
        let mut bad = sample("2025-W01", "nyx");
        bad.source_record_ids.clear();
        assert!(store.append(&bad).is_err());
    }
}
