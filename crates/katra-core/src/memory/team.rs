//! Team membership records backing `Isolation::Team` visibility checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A named team and its current membership.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub team_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub members: Vec<String>,
}

impl TeamRecord {
    pub fn validate(&self) -> Result<()> {
        if self.team_name.trim().is_empty() {
            return Err(EngineError::InvalidInput("team_name must not be empty".into()));
        }
        if !self.members.iter().any(|m| m == &self.created_by) {
            return Err(EngineError::InvalidInput(
                "team creator must be a member".into(),
            ));
        }
        Ok(())
    }

    pub fn has_member(&self, owner_id: &str) -> bool {
        self.members.iter().any(|m| m == owner_id)
    }
}

/// Input for `create_team` / `join_team` / `leave_team`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TeamMembershipInput {
    pub team_name: String,
    pub owner_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_must_be_member() {
        let team = TeamRecord {
            team_name: "arch".into(),
            created_by: "nyx".into(),
            created_at: Utc::now(),
            members: vec!["echo".into()],
        };
        assert!(team.validate().is_err());
    }

    #[test]
    fn has_member_checks_membership() {
        let team = TeamRecord {
            team_name: "arch".into(),
            created_by: "nyx".into(),
            created_at: Utc::now(),
            members: vec!["nyx".into(), "echo".into()],
        };
        assert!(team.validate().is_ok());
        assert!(team.has_member("echo"));
        assert!(!team.has_member("ghost"));
    }
}
