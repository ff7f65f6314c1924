//! Secondary index schema migrations.

/// A single migration step.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "memories table, FTS5 content index, teams, forget log",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "archived_not_allowed flag, owner name registry",
        up: MIGRATION_V2_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    record_id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    record_type TEXT NOT NULL,
    importance REAL NOT NULL,
    archived INTEGER NOT NULL DEFAULT 0,
    archived_at TEXT,
    archive_reason TEXT,
    marked_important INTEGER NOT NULL DEFAULT 0,
    marked_forgettable INTEGER NOT NULL DEFAULT 0,
    emotion_intensity REAL NOT NULL DEFAULT 0.0,
    graph_centrality REAL NOT NULL DEFAULT 0.0,
    last_accessed TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    isolation TEXT NOT NULL,
    team_name TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_owner ON memories(owner_id);
CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp);
CREATE INDEX IF NOT EXISTS idx_memories_archived ON memories(archived);
CREATE INDEX IF NOT EXISTS idx_memories_importance ON memories(importance);

-- Content lives in the hot tier, not in `memories`, so this FTS5 table
-- stores its own copy of `content` rather than referencing an external
-- content table; the engine keeps it in sync explicitly alongside every
-- `memories` write (there is no single source row to trigger off).
CREATE VIRTUAL TABLE IF NOT EXISTS memory_content_fts USING fts5(
    record_id UNINDEXED,
    content
);

CREATE TABLE IF NOT EXISTS memory_forget_log (
    record_id TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    content TEXT NOT NULL,
    forgotten_at TEXT NOT NULL,
    reason TEXT
);

CREATE TABLE IF NOT EXISTS teams (
    team_name TEXT PRIMARY KEY,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS team_members (
    team_name TEXT NOT NULL REFERENCES teams(team_name) ON DELETE CASCADE,
    owner_id TEXT NOT NULL,
    PRIMARY KEY (team_name, owner_id)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// `archived_not_allowed` is a fourth consolidation preservation override
/// alongside `marked_important`/`marked_forgettable`/recency; `owner_registry`
/// backs `session::Registry` so display-name -> owner_id resolution survives
/// a process restart instead of re-minting a fresh `owner_id` on every
/// `register` call.
const MIGRATION_V2_UP: &str = r#"
ALTER TABLE memories ADD COLUMN archived_not_allowed INTEGER NOT NULL DEFAULT 0;

CREATE TABLE IF NOT EXISTS owner_registry (
    display_name TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Applies every migration whose version exceeds the database's current
/// version, in ascending order. Returns the number of migrations applied.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "applying index migration"
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&conn).unwrap();
        assert_eq!(applied, MIGRATIONS.len() as u32);
        assert_eq!(
            get_current_version(&conn).unwrap(),
            MIGRATIONS.last().unwrap().version
        );
    }

    #[test]
    fn reapplying_migrations_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let applied_again = apply_migrations(&conn).unwrap();
        assert_eq!(applied_again, 0);
    }
}
