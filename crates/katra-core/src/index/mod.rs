//! Secondary index: an embedded relational store mirroring the hot tier for
//! fast query/update/delete. A reader/writer `Mutex<Connection>` pair,
//! `row_to_*` mapping functions, and `sanitize_fts5_query` for safe
//! full-text search.

pub mod migrations;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{EngineError, Result};
use crate::memory::{Isolation, MemoryRecord, RecordType, TeamRecord};

/// Row projection returned by index queries; callers resolve full content
/// from the hot tier (the index never stores `content`).
#[derive(Debug, Clone)]
pub struct IndexRow {
    pub record_id: String,
    pub owner_id: String,
    pub timestamp: DateTime<Utc>,
    pub record_type: RecordType,
    pub importance: f64,
    pub archived: bool,
    pub marked_important: bool,
    pub marked_forgettable: bool,
    pub emotion_intensity: f64,
    pub graph_centrality: f64,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub isolation: Isolation,
    pub team_name: Option<String>,
    pub archived_not_allowed: bool,
}

/// Filter accepted by [`Index::recall`].
#[derive(Debug, Clone, Default)]
pub struct RecallFilter {
    pub owner_id: String,
    pub topic: String,
    pub min_importance: Option<f64>,
    pub record_type: Option<RecordType>,
    pub limit: u32,
}

/// Strip FTS5 query-syntax characters that would otherwise be interpreted
/// as operators (`"`, `*`, `:`, parens) and wrap the remainder in quotes so
/// arbitrary user text can never break out of a MATCH expression.
pub fn sanitize_fts5_query(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '*' | ':' | '(' | ')' | '^'))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "\"\"".to_string()
    } else {
        format!("\"{}\"", trimmed.replace('"', ""))
    }
}

pub struct Index {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Index {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            crate::jsonl::ensure_dir(parent)?;
        }
        let writer_conn = Connection::open(db_path)?;
        Self::configure(&writer_conn)?;
        migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(db_path)?;
        Self::configure(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// True when the database file did not exist or its schema version is
    /// older than the current one — the caller should rebuild from the hot
    /// tier in that case.
    pub fn needs_rebuild(db_path: &Path) -> Result<bool> {
        if !db_path.exists() {
            return Ok(true);
        }
        let conn = Connection::open(db_path)?;
        let version = migrations::get_current_version(&conn)?;
        let latest = migrations::MIGRATIONS.last().map(|m| m.version).unwrap_or(0);
        Ok(version < latest)
    }

    pub fn wipe(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)?;
        }
        let wal = PathBuf::from(format!("{}-wal", db_path.display()));
        let shm = PathBuf::from(format!("{}-shm", db_path.display()));
        let _ = std::fs::remove_file(wal);
        let _ = std::fs::remove_file(shm);
        Ok(())
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| EngineError::Internal("index writer lock poisoned".into()))
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| EngineError::Internal("index reader lock poisoned".into()))
    }

    /// Insert or replace both the attribute row and the FTS row for `record`.
    pub fn upsert(&self, record: &MemoryRecord) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO memories (
                record_id, owner_id, timestamp, record_type, importance,
                archived, archived_at, archive_reason, marked_important,
                marked_forgettable, emotion_intensity, graph_centrality,
                last_accessed, access_count, isolation, team_name,
                archived_not_allowed
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)
            ON CONFLICT(record_id) DO UPDATE SET
                owner_id = excluded.owner_id,
                timestamp = excluded.timestamp,
                record_type = excluded.record_type,
                importance = excluded.importance,
                archived = excluded.archived,
                archived_at = excluded.archived_at,
                archive_reason = excluded.archive_reason,
                marked_important = excluded.marked_important,
                marked_forgettable = excluded.marked_forgettable,
                emotion_intensity = excluded.emotion_intensity,
                graph_centrality = excluded.graph_centrality,
                last_accessed = excluded.last_accessed,
                access_count = excluded.access_count,
                isolation = excluded.isolation,
                team_name = excluded.team_name,
                archived_not_allowed = excluded.archived_not_allowed",
            params![
                record.record_id,
                record.owner_id,
                record.timestamp.to_rfc3339(),
                record.record_type.as_str(),
                record.importance,
                record.archived as i64,
                record.archived_at.map(|t| t.to_rfc3339()),
                record.archive_reason,
                record.marked_important as i64,
                record.marked_forgettable as i64,
                record.emotion_intensity,
                record.graph_centrality,
                record.last_accessed.to_rfc3339(),
                record.access_count as i64,
                record.isolation.as_str(),
                record.team_name,
                record.archived_not_allowed as i64,
            ],
        )?;

        conn.execute(
            "DELETE FROM memory_content_fts WHERE record_id = ?1",
            params![record.record_id],
        )?;
        conn.execute(
            "INSERT INTO memory_content_fts (record_id, content) VALUES (?1, ?2)",
            params![record.record_id, record.content],
        )?;
        Ok(())
    }

    pub fn get(&self, record_id: &str) -> Result<Option<IndexRow>> {
        let conn = self.reader()?;
        conn.query_row(
            "SELECT record_id, owner_id, timestamp, record_type, importance,
                    archived, marked_important, marked_forgettable,
                    emotion_intensity, graph_centrality, last_accessed,
                    access_count, isolation, team_name, archived_not_allowed
             FROM memories WHERE record_id = ?1",
            params![record_id],
            Self::row_to_index_row,
        )
        .optional()
        .map_err(EngineError::from)
    }

    fn row_to_index_row(row: &rusqlite::Row) -> rusqlite::Result<IndexRow> {
        let timestamp: String = row.get(2)?;
        let record_type: String = row.get(3)?;
        let last_accessed: String = row.get(10)?;
        let isolation: String = row.get(12)?;
        Ok(IndexRow {
            record_id: row.get(0)?,
            owner_id: row.get(1)?,
            timestamp: parse_ts(&timestamp)?,
            record_type: RecordType::parse_name(&record_type),
            importance: row.get(4)?,
            archived: row.get::<_, i64>(5)? != 0,
            marked_important: row.get::<_, i64>(6)? != 0,
            marked_forgettable: row.get::<_, i64>(7)? != 0,
            emotion_intensity: row.get(8)?,
            graph_centrality: row.get(9)?,
            last_accessed: parse_ts(&last_accessed)?,
            access_count: row.get::<_, i64>(11)? as u64,
            isolation: Isolation::parse_name(&isolation).unwrap_or(Isolation::Private),
            team_name: row.get(13)?,
            archived_not_allowed: row.get::<_, i64>(14)? != 0,
        })
    }

    /// `recall_about`: FTS match joined to `memories`, filtered by owner and
    /// unarchived, ordered importance desc then timestamp desc.
    pub fn recall(&self, filter: &RecallFilter) -> Result<Vec<IndexRow>> {
        let conn = self.reader()?;
        let query = sanitize_fts5_query(&filter.topic);
        let limit = if filter.limit == 0 { 100 } else { filter.limit };
        let min_importance = filter.min_importance.unwrap_or(0.0);

        let mut stmt = conn.prepare(
            "SELECT m.record_id, m.owner_id, m.timestamp, m.record_type, m.importance,
                    m.archived, m.marked_important, m.marked_forgettable,
                    m.emotion_intensity, m.graph_centrality, m.last_accessed,
                    m.access_count, m.isolation, m.team_name, m.archived_not_allowed
             FROM memories m
             JOIN memory_content_fts fts ON m.record_id = fts.record_id
             WHERE memory_content_fts MATCH ?1
               AND m.owner_id = ?2
               AND m.archived = 0
               AND m.importance >= ?3
             ORDER BY m.importance DESC, m.timestamp DESC
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(
                params![query, filter.owner_id, min_importance, limit],
                Self::row_to_index_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Same match/order as `recall` but across every owner — access control
    /// decides visibility afterward, per row, rather than the SQL filtering
    /// by owner up front. Used by `recall`, since a topic search must surface
    /// other owners' PUBLIC/TEAM-visible records too.
    pub fn recall_any_owner(&self, filter: &RecallFilter) -> Result<Vec<IndexRow>> {
        let conn = self.reader()?;
        let query = sanitize_fts5_query(&filter.topic);
        let limit = if filter.limit == 0 { 100 } else { filter.limit };
        let min_importance = filter.min_importance.unwrap_or(0.0);

        let mut stmt = conn.prepare(
            "SELECT m.record_id, m.owner_id, m.timestamp, m.record_type, m.importance,
                    m.archived, m.marked_important, m.marked_forgettable,
                    m.emotion_intensity, m.graph_centrality, m.last_accessed,
                    m.access_count, m.isolation, m.team_name, m.archived_not_allowed
             FROM memories m
             JOIN memory_content_fts fts ON m.record_id = fts.record_id
             WHERE memory_content_fts MATCH ?1
               AND m.archived = 0
               AND m.importance >= ?2
             ORDER BY m.importance DESC, m.timestamp DESC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![query, min_importance, limit], Self::row_to_index_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn archive(&self, record_id: &str, reason: &str, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.writer()?;
        let rows = conn.execute(
            "UPDATE memories SET archived = 1, archived_at = ?1, archive_reason = ?2
             WHERE record_id = ?3 AND archived = 0",
            params![now.to_rfc3339(), reason, record_id],
        )?;
        Ok(rows > 0)
    }

    pub fn fade(&self, record_id: &str, target_importance: f64) -> Result<bool> {
        let conn = self.writer()?;
        let rows = conn.execute(
            "UPDATE memories SET importance = ?1, marked_forgettable = 1 WHERE record_id = ?2",
            params![target_importance, record_id],
        )?;
        Ok(rows > 0)
    }

    /// Deletes `record_id` from `memories` and the FTS index, then logs its
    /// pre-delete `content` into `memory_forget_log`. Returns `false` if the
    /// record did not exist.
    pub fn forget(
        &self,
        record_id: &str,
        owner_id: &str,
        content: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.writer()?;
        let rows = conn.execute("DELETE FROM memories WHERE record_id = ?1", params![record_id])?;
        if rows == 0 {
            return Ok(false);
        }
        conn.execute(
            "DELETE FROM memory_content_fts WHERE record_id = ?1",
            params![record_id],
        )?;
        conn.execute(
            "INSERT INTO memory_forget_log (record_id, owner_id, content, forgotten_at, reason)
             VALUES (?1,?2,?3,?4,?5)",
            params![record_id, owner_id, content, now.to_rfc3339(), reason],
        )?;
        Ok(true)
    }

    /// `forget_by_pattern`: enumerates up to 1000 FTS matches; when
    /// `dry_run` is true, returns the candidate count without mutating.
    pub fn forget_by_pattern_candidates(&self, owner_id: &str, pattern: &str) -> Result<Vec<String>> {
        let conn = self.reader()?;
        let query = sanitize_fts5_query(pattern);
        let mut stmt = conn.prepare(
            "SELECT m.record_id FROM memories m
             JOIN memory_content_fts fts ON m.record_id = fts.record_id
             WHERE memory_content_fts MATCH ?1 AND m.owner_id = ?2
             LIMIT 1000",
        )?;
        let ids = stmt
            .query_map(params![query, owner_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    pub fn forgotten_log_entry(&self, record_id: &str) -> Result<Option<(String, String)>> {
        let conn = self.reader()?;
        conn.query_row(
            "SELECT owner_id, content FROM memory_forget_log WHERE record_id = ?1",
            params![record_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(EngineError::from)
    }

    pub fn create_team(&self, team_name: &str, created_by: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO teams (team_name, created_by, created_at) VALUES (?1,?2,?3)",
            params![team_name, created_by, now.to_rfc3339()],
        )?;
        conn.execute(
            "INSERT INTO team_members (team_name, owner_id) VALUES (?1,?2)",
            params![team_name, created_by],
        )?;
        Ok(())
    }

    pub fn join_team(&self, team_name: &str, owner_id: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT OR IGNORE INTO team_members (team_name, owner_id) VALUES (?1,?2)",
            params![team_name, owner_id],
        )?;
        Ok(())
    }

    pub fn leave_team(&self, team_name: &str, owner_id: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "DELETE FROM team_members WHERE team_name = ?1 AND owner_id = ?2",
            params![team_name, owner_id],
        )?;
        Ok(())
    }

    pub fn team_members(&self, team_name: &str) -> Result<Vec<String>> {
        let conn = self.reader()?;
        let mut stmt =
            conn.prepare("SELECT owner_id FROM team_members WHERE team_name = ?1")?;
        let members = stmt
            .query_map(params![team_name], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    pub fn team_exists(&self, team_name: &str) -> Result<bool> {
        let conn = self.reader()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM teams WHERE team_name = ?1",
            params![team_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Full current state of `team_name` (creator, creation time, and
    /// membership list) for callers that need to mirror it out of the
    /// index, e.g. `TeamStore`'s JSON files.
    pub fn get_team(&self, team_name: &str) -> Result<Option<TeamRecord>> {
        let conn = self.reader()?;
        let created: Option<(String, String)> = conn
            .query_row(
                "SELECT created_by, created_at FROM teams WHERE team_name = ?1",
                params![team_name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((created_by, created_at)) = created else {
            return Ok(None);
        };
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| EngineError::Internal(format!("corrupt team created_at: {e}")))?
            .with_timezone(&Utc);
        let members = self.team_members(team_name)?;
        Ok(Some(TeamRecord {
            team_name: team_name.to_string(),
            created_by,
            created_at,
            members,
        }))
    }

    /// Sets `marked_important`/`marked_forgettable`/`archived_not_allowed`
    /// directly; `None` leaves the corresponding column untouched.
    pub fn set_flags(
        &self,
        record_id: &str,
        marked_important: Option<bool>,
        marked_forgettable: Option<bool>,
        archived_not_allowed: Option<bool>,
    ) -> Result<bool> {
        let conn = self.writer()?;
        let mut changed = 0;
        if let Some(v) = marked_important {
            changed += conn.execute(
                "UPDATE memories SET marked_important = ?1 WHERE record_id = ?2",
                params![v as i64, record_id],
            )?;
        }
        if let Some(v) = marked_forgettable {
            changed += conn.execute(
                "UPDATE memories SET marked_forgettable = ?1 WHERE record_id = ?2",
                params![v as i64, record_id],
            )?;
        }
        if let Some(v) = archived_not_allowed {
            changed += conn.execute(
                "UPDATE memories SET archived_not_allowed = ?1 WHERE record_id = ?2",
                params![v as i64, record_id],
            )?;
        }
        Ok(changed > 0)
    }

    /// Re-points isolation/team_name for `record_id`. The hot tier's JSONL
    /// line keeps the original values; the index row is authoritative from
    /// here on, same as the other lifecycle mutations.
    pub fn set_isolation(
        &self,
        record_id: &str,
        isolation: Isolation,
        team_name: Option<&str>,
    ) -> Result<bool> {
        let conn = self.writer()?;
        let rows = conn.execute(
            "UPDATE memories SET isolation = ?1, team_name = ?2 WHERE record_id = ?3",
            params![isolation.as_str(), team_name, record_id],
        )?;
        Ok(rows > 0)
    }

    /// Clears the archived flag, used by orphan recovery to put a record
    /// back up for consolidation next cycle.
    pub fn unarchive(&self, record_id: &str) -> Result<bool> {
        let conn = self.writer()?;
        let rows = conn.execute(
            "UPDATE memories SET archived = 0, archived_at = NULL, archive_reason = NULL
             WHERE record_id = ?1 AND archived = 1",
            params![record_id],
        )?;
        Ok(rows > 0)
    }

    pub fn touch_access(&self, record_id: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "UPDATE memories SET last_accessed = ?1, access_count = access_count + 1
             WHERE record_id = ?2",
            params![now.to_rfc3339(), record_id],
        )?;
        Ok(())
    }

    /// All unarchived-or-archived rows for `owner_id`, newest first. Used by
    /// orphan recovery, which needs every row rather than a text match.
    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<IndexRow>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT record_id, owner_id, timestamp, record_type, importance,
                    archived, marked_important, marked_forgettable,
                    emotion_intensity, graph_centrality, last_accessed,
                    access_count, isolation, team_name, archived_not_allowed
             FROM memories WHERE owner_id = ?1
             ORDER BY timestamp DESC",
        )?;
        let rows = stmt
            .query_map(params![owner_id], Self::row_to_index_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Looks up a previously persisted `owner_id` for `display_name`, if any.
    pub fn resolve_owner_name(&self, display_name: &str) -> Result<Option<String>> {
        let conn = self.reader()?;
        conn.query_row(
            "SELECT owner_id FROM owner_registry WHERE display_name = ?1",
            params![display_name],
            |row| row.get(0),
        )
        .optional()
        .map_err(EngineError::from)
    }

    /// Persists a freshly minted `display_name` -> `owner_id` mapping.
    pub fn insert_owner_name(&self, display_name: &str, owner_id: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT OR IGNORE INTO owner_registry (display_name, owner_id) VALUES (?1,?2)",
            params![display_name, owner_id],
        )?;
        Ok(())
    }

    pub fn stats(&self, owner_id: &str) -> Result<(u64, u64)> {
        let conn = self.reader()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE owner_id = ?1 AND archived = 0",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok((count as u64, 0))
    }
}

fn parse_ts(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordType;
    use tempfile::TempDir;

    fn sample_record(id: &str, owner: &str, content: &str) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            record_id: id.into(),
            owner_id: owner.into(),
            timestamp: now,
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
            last_accessed: now,
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
    fn upsert_then_recall_matches_content() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        index.upsert(&sample_record("r1", "nyx", "prefer JSONL for hot tier")).unwrap();

        let hits = index
            .recall(&RecallFilter {
                owner_id: "nyx".into(),
                topic: "JSONL".into(),
                min_importance: None,
                record_type: None,
                limit: 10,
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record_id, "r1");
    }

    #[test]
    fn archived_records_excluded_from_recall() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        index.upsert(&sample_record("r1", "nyx", "archived note")).unwrap();
        assert!(index.archive("r1", "aged out", Utc::now()).unwrap());

        let hits = index
            .recall(&RecallFilter {
                owner_id: "nyx".into(),
                topic: "archived".into(),
                min_importance: None,
                record_type: None,
                limit: 10,
            })
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn forget_removes_row_and_logs_content() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        index.upsert(&sample_record("r1", "nyx", "ephemeral note")).unwrap();

        let removed = index
            .forget("r1", "nyx", "ephemeral note", Some("test"), Utc::now())
            .unwrap();
        assert!(removed);
        assert!(index.get("r1").unwrap().is_none());

        let (owner, content) = index.forgotten_log_entry("r1").unwrap().unwrap();
        assert_eq!(owner, "nyx");
        assert_eq!(content, "ephemeral note");
    }

    #[test]
    fn archive_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        index.upsert(&sample_record("r1", "nyx", "note")).unwrap();
        assert!(index.archive("r1", "first", Utc::now()).unwrap());
        assert!(!index.archive("r1", "second", Utc::now()).unwrap());
    }

    #[test]
    fn owner_registry_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("index.db");
        {
            let index = Index::open(&db_path).unwrap();
            assert!(index.resolve_owner_name("Nyx").unwrap().is_none());
            index.insert_owner_name("Nyx", "owner-123").unwrap();
        }
        let reopened = Index::open(&db_path).unwrap();
        assert_eq!(reopened.resolve_owner_name("Nyx").unwrap(), Some("owner-123".to_string()));
    }

    #[test]
    fn set_flags_can_set_archived_not_allowed() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        index.upsert(&sample_record("r1", "nyx", "protect me")).unwrap();
        assert!(index.set_flags("r1", None, None, Some(true)).unwrap());
        assert!(index.get("r1").unwrap().unwrap().archived_not_allowed);
    }

    #[test]
    fn get_team_reflects_current_membership() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        index.create_team("arch", "nyx", Utc::now()).unwrap();
        index.join_team("arch", "echo").unwrap();

        let team = index.get_team("arch").unwrap().unwrap();
        assert_eq!(team.created_by, "nyx");
        assert_eq!(team.members, vec!["nyx".to_string(), "echo".to_string()]);
        assert!(index.get_team("ghost").unwrap().is_none());
    }

    #[test]
    fn team_join_is_idempotent_on_membership() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        index.create_team("arch", "nyx", Utc::now()).unwrap();
        index.join_team("arch", "echo").unwrap();
        index.join_team("arch", "echo").unwrap();
        let members = index.team_members("arch").unwrap();
        assert_eq!(members.iter().filter(|m| *m == "echo").count(), 1);
    }

    #[test]
    fn sanitize_strips_fts_operators() {
        let cleaned = sanitize_fts5_query("hello \"world\" AND *star*");
        assert!(!cleaned.contains('*'));
        assert_eq!(cleaned.matches('"').count(), 2);
    }

    #[test]
    fn needs_rebuild_true_for_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.db");
        assert!(Index::needs_rebuild(&path).unwrap());
    }
}
