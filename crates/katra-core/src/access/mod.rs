//! Access control: per-record isolation checks and team membership lookups.

use std::path::PathBuf;

use crate::error::Result;
use crate::index::Index;
use crate::jsonl;
use crate::memory::{Isolation, TeamRecord};

/// Outcome of an access check, carried into the audit call site so callers
/// don't have to re-derive the human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(&'static str),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Evaluates the owner/isolation/team-match truth table: the requester
/// always sees their own records; otherwise PUBLIC is visible to everyone,
/// PRIVATE to no one else, and TEAM only to current members of `team_name`.
/// Unknown isolation values (parse failure upstream) must already have been
/// turned into `Isolation::Private` by the caller, which denies here too.
pub fn check_access(
    index: &Index,
    requester_id: &str,
    owner_id: &str,
    isolation: Isolation,
    team_name: Option<&str>,
) -> crate::error::Result<AccessDecision> {
    if requester_id == owner_id {
        return Ok(AccessDecision::Allow);
    }
    match isolation {
        Isolation::Public => Ok(AccessDecision::Allow),
        Isolation::Private => Ok(AccessDecision::Deny("record is private to its owner")),
        Isolation::Team => {
            let Some(team) = team_name else {
                return Ok(AccessDecision::Deny("team record missing team_name"));
            };
            let members = index.team_members(team)?;
            if members.iter().any(|m| m == requester_id) {
                Ok(AccessDecision::Allow)
            } else {
                Ok(AccessDecision::Deny("requester is not a member of the record's team"))
            }
        }
    }
}

/// Writes a JSON mirror of each team's current membership to
/// `<teams_dir>/<team_name>.json`, called after every successful
/// `create_team`/`join_team`/`leave_team` index mutation so the on-disk
/// layout always reflects current state, not just the index.
pub struct TeamStore {
    teams_dir: PathBuf,
}

impl TeamStore {
    pub fn new(teams_dir: PathBuf) -> Self {
        Self { teams_dir }
    }

    fn path_for(&self, team_name: &str) -> PathBuf {
        self.teams_dir.join(format!("{team_name}.json"))
    }

    pub fn write(&self, record: &TeamRecord) -> Result<()> {
        jsonl::write_json_file(&self.path_for(&record.team_name), record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn index() -> (TempDir, Index) {
        let dir = TempDir::new().unwrap();
        let index = Index::open(&dir.path().join("index.db")).unwrap();
        (dir, index)
    }

    #[test]
    fn owner_always_allowed() {
        let (_dir, index) = index();
        let decision = check_access(&index, "nyx", "nyx", Isolation::Private, None).unwrap();
        assert_eq!(decision, AccessDecision::Allow);
    }

    #[test]
    fn public_allowed_for_anyone() {
        let (_dir, index) = index();
        let decision = check_access(&index, "echo", "nyx", Isolation::Public, None).unwrap();
        assert_eq!(decision, AccessDecision::Allow);
    }

    #[test]
    fn private_denied_for_others() {
        let (_dir, index) = index();
        let decision = check_access(&index, "echo", "nyx", Isolation::Private, None).unwrap();
        assert!(!decision.is_allowed());
    }

    #[test]
    fn team_allowed_only_for_members() {
        let (_dir, index) = index();
        index.create_team("arch", "nyx", Utc::now()).unwrap();
        index.join_team("arch", "echo").unwrap();

        let allowed = check_access(&index, "echo", "nyx", Isolation::Team, Some("arch")).unwrap();
        assert!(allowed.is_allowed());

        let denied = check_access(&index, "carol", "nyx", Isolation::Team, Some("arch")).unwrap();
        assert!(!denied.is_allowed());
    }

    #[test]
    fn team_store_writes_readable_mirror_file() {
        let dir = TempDir::new().unwrap();
        let store = TeamStore::new(dir.path().to_path_buf());
        let team = TeamRecord {
            team_name: "arch".into(),
            created_by: "nyx".into(),
            created_at: Utc::now(),
            members: vec!["nyx".into(), "echo".into()],
        };
        store.write(&team).unwrap();

        let path = dir.path().join("arch.json");
        assert!(path.exists());
        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: TeamRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.team_name, "arch");
        assert_eq!(parsed.members, vec!["nyx".to_string(), "echo".to_string()]);
    }
}
