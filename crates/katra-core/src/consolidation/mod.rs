//! Consolidation Engine: Selection -> Grouping -> Digest write -> Hot-tier
//! disposition -> Audit, behind a pluggable grouping strategy.

use chrono::{DateTime, Utc};

use crate::digest_store::DigestStore;
use crate::error::Result;
use crate::hot_tier::{HotTier, QueryFilter};
use crate::index::{Index, IndexRow};
use crate::memory::{DigestEntities, DigestRecord, PeriodType};

/// Default compaction trigger: a daily file is rewritten once more than this
/// fraction of its rows are archived.
pub const DEFAULT_COMPACTION_THRESHOLD: f64 = 0.25;

/// Tunables for one consolidation run, usually sourced from engine config.
#[derive(Debug, Clone)]
pub struct ConsolidationConfig {
    pub max_age_days: i64,
    pub compaction_threshold: f64,
    pub period_type: PeriodType,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_age_days: 90,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            period_type: PeriodType::Weekly,
        }
    }
}

/// Groups candidate record IDs into digest-worthy clusters. The default
/// implementation never groups: every candidate becomes its own
/// single-member digest. A real similarity function can be plugged in by
/// implementing this trait.
pub trait Grouping {
    fn group(&self, candidate_ids: &[String]) -> Vec<Vec<String>>;
}

/// Default strategy: no grouping, one record per group.
pub struct NoGrouping;

impl Grouping for NoGrouping {
    fn group(&self, candidate_ids: &[String]) -> Vec<Vec<String>> {
        candidate_ids.iter().map(|id| vec![id.clone()]).collect()
    }
}

/// Outcome of one `consolidation_run` invocation.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    pub candidates_considered: u64,
    pub records_archived: u64,
    pub digests_written: u64,
    pub files_compacted: u64,
    /// IDs of records archived during this run, in archival order — callers
    /// audit one row per id rather than one row for the whole run.
    pub archived_record_ids: Vec<String>,
}

/// Candidate selection: age past the cutoff, not explicitly exempted, and
/// not marked important — unless it is marked forgettable, in which case
/// age does not matter. Reads the index row rather than the hot-tier
/// record, since `marked_important`/`marked_forgettable`/`last_accessed`
/// are mutated in the index only.
fn is_candidate(row: &IndexRow, now: DateTime<Utc>, max_age_days: i64) -> bool {
    if row.marked_forgettable {
        return true;
    }
    if row.marked_important {
        return false;
    }
    if row.archived_not_allowed {
        return false;
    }
    let age = now.signed_duration_since(row.timestamp);
    if age < chrono::Duration::days(max_age_days) {
        return false;
    }
    let recently_accessed = now.signed_duration_since(row.last_accessed) < chrono::Duration::days(7);
    if recently_accessed {
        return false;
    }
    if row.emotion_intensity >= 0.7 {
        return false;
    }
    if row.graph_centrality >= 0.5 {
        return false;
    }
    true
}

/// Runs one consolidation pass for `owner_id`. `dry_run` selects candidates
/// and reports counts without writing digests or mutating the index.
pub fn run(
    hot_tier: &HotTier,
    index: &Index,
    digest_store: &DigestStore,
    grouping: &dyn Grouping,
    owner_id: &str,
    config: &ConsolidationConfig,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<ConsolidationReport> {
    let mut report = ConsolidationReport::default();

    let rows = index.list_for_owner(owner_id)?;
    let candidate_ids: Vec<String> = rows
        .iter()
        .filter(|row| !row.archived && is_candidate(row, now, config.max_age_days))
        .map(|row| row.record_id.clone())
        .collect();
    report.candidates_considered = candidate_ids.len() as u64;

    if dry_run || candidate_ids.is_empty() {
        return Ok(report);
    }

    let live = hot_tier.query(&QueryFilter {
        owner_id: owner_id.to_string(),
        ..Default::default()
    })?;
    let by_id: std::collections::HashMap<&str, &crate::memory::MemoryRecord> =
        live.iter().map(|r| (r.record_id.as_str(), r)).collect();

    let groups = grouping.group(&candidate_ids);
    let period_id = config.period_type.format_period_id(now);

    for group in groups {
        if group.is_empty() {
            continue;
        }
        let summary = summarize(&group, &by_id);
        let digest = DigestRecord {
            digest_id: uuid::Uuid::new_v4().to_string(),
            period_id: period_id.clone(),
            period_type: config.period_type,
            digest_type: "consolidation".to_string(),
            timestamp: now,
            owner_id: owner_id.to_string(),
            source_record_count: group.len() as u64,
            source_tier: "tier1".to_string(),
            source_record_ids: group.clone(),
            summary,
            themes: Vec::new(),
            keywords: Vec::new(),
            key_insights: Vec::new(),
            decisions_made: Vec::new(),
            entities: DigestEntities::default(),
            archived: false,
        };
        digest_store.append(&digest)?;
        report.digests_written += 1;

        for record_id in &group {
            if index.archive(record_id, "consolidation: aged past max_age_days", now)? {
                report.records_archived += 1;
                report.archived_record_ids.push(record_id.clone());
            }
        }
    }

    let archived_ids: std::collections::HashSet<String> = candidate_ids.into_iter().collect();
    report.files_compacted = hot_tier.compact(config.compaction_threshold, |record_id| {
        archived_ids.contains(record_id)
            || index
                .get(record_id)
                .ok()
                .flatten()
                .map(|row| row.archived)
                .unwrap_or(false)
    })?;

    Ok(report)
}

fn summarize(
    group: &[String],
    by_id: &std::collections::HashMap<&str, &crate::memory::MemoryRecord>,
) -> String {
    let mut parts = Vec::new();
    for id in group {
        if let Some(record) = by_id.get(id.as_str()) {
            let snippet: String = record.content.chars().take(80).collect();
            parts.push(snippet);
        }
    }
    if parts.is_empty() {
        format!("{} record(s) consolidated", group.len())
    } else {
        parts.join("; ")
    }
}

/// Detects rows archived without a matching digest — the orphan state left
/// by a crash between the archive step and the digest-write step. Default
/// recovery policy unsets the archived flag so the next run re-selects them.
pub fn recover_orphans(index: &Index, digest_store: &DigestStore, owner_id: &str) -> Result<u64> {
    let mut recovered = 0u64;
    let digests = digest_store.query(&crate::digest_store::DigestFilter {
        owner_id: owner_id.to_string(),
        ..Default::default()
    })?;
    let digested: std::collections::HashSet<String> = digests
        .into_iter()
        .flat_map(|d| d.source_record_ids)
        .collect();

    let live = index.list_for_owner(owner_id)?;

    for row in live {
        if row.archived && !digested.contains(&row.record_id) {
            if index.unarchive(&row.record_id)? {
                recovered += 1;
            }
        }
    }
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Isolation, RecordType};
    use tempfile::TempDir;

    fn record(id: &str, owner: &str, ts: DateTime<Utc>, important: bool) -> crate::memory::MemoryRecord {
        crate::memory::MemoryRecord {
            record_id: id.into(),
            owner_id: owner.into(),
            timestamp: ts,
            record_type: RecordType::Knowledge,
            importance: 0.4,
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
            marked_important: important,
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

    fn harness() -> (TempDir, HotTier, Index, DigestStore) {
        let dir = TempDir::new().unwrap();
        let hot_tier = HotTier::open(dir.path(), crate::hot_tier::DEFAULT_MAX_FILE_BYTES).unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        let digest_store = DigestStore::open(dir.path(), crate::digest_store::DEFAULT_MAX_FILE_BYTES).unwrap();
        (dir, hot_tier, index, digest_store)
    }

    #[test]
    fn archives_old_unimportant_records_and_preserves_important() {
        let (_dir, hot_tier, index, digest_store) = harness();
        let old = Utc::now() - chrono::Duration::days(100);

        let plain = record("r1", "nyx", old, false);
        let important = record("r2", "nyx", old, true);
        hot_tier.store(&plain).unwrap();
        hot_tier.store(&important).unwrap();
        index.upsert(&plain).unwrap();
        index.upsert(&important).unwrap();

        let config = ConsolidationConfig { max_age_days: 90, ..Default::default() };
        let report = run(&hot_tier, &index, &digest_store, &NoGrouping, "nyx", &config, Utc::now(), false).unwrap();

        assert_eq!(report.records_archived, 1);
        assert_eq!(report.digests_written, 1);
        assert!(index.get("r1").unwrap().unwrap().archived);
        assert!(!index.get("r2").unwrap().unwrap().archived);
    }

    #[test]
    fn dry_run_reports_without_mutating() {
        let (_dir, hot_tier, index, digest_store) = harness();
        let old = Utc::now() - chrono::Duration::days(100);
        let plain = record("r1", "nyx", old, false);
        hot_tier.store(&plain).unwrap();
        index.upsert(&plain).unwrap();

        let config = ConsolidationConfig::default();
        let report = run(&hot_tier, &index, &digest_store, &NoGrouping, "nyx", &config, Utc::now(), true).unwrap();

        assert_eq!(report.candidates_considered, 1);
        assert_eq!(report.digests_written, 0);
        assert!(!index.get("r1").unwrap().unwrap().archived);
    }

    #[test]
    fn recently_accessed_records_are_exempt() {
        let (_dir, hot_tier, index, digest_store) = harness();
        let old = Utc::now() - chrono::Duration::days(100);
        let mut plain = record("r1", "nyx", old, false);
        plain.last_accessed = Utc::now();
        hot_tier.store(&plain).unwrap();
        index.upsert(&plain).unwrap();

        let config = ConsolidationConfig::default();
        let report = run(&hot_tier, &index, &digest_store, &NoGrouping, "nyx", &config, Utc::now(), false).unwrap();
        assert_eq!(report.candidates_considered, 0);
    }

    #[test]
    fn archived_not_allowed_records_are_exempt() {
        let (_dir, hot_tier, index, digest_store) = harness();
        let old = Utc::now() - chrono::Duration::days(100);
        let plain = record("r1", "nyx", old, false);
        hot_tier.store(&plain).unwrap();
        index.upsert(&plain).unwrap();
        assert!(index.set_flags("r1", None, None, Some(true)).unwrap());

        let config = ConsolidationConfig { max_age_days: 90, ..Default::default() };
        let report = run(&hot_tier, &index, &digest_store, &NoGrouping, "nyx", &config, Utc::now(), false).unwrap();
        assert_eq!(report.candidates_considered, 0);
        assert!(!index.get("r1").unwrap().unwrap().archived);
    }
}
