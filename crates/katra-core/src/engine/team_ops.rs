//! `team_create`, `team_join`, `team_leave`, `team_list`.

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::memory::AuditEventType;

use super::Engine;

pub struct TeamSummary {
    pub team_name: String,
    pub members: Vec<String>,
}

impl Engine {
    pub fn team_create(&self, owner_id: &str, team_name: &str) -> Result<TeamSummary> {
        if team_name.trim().is_empty() {
            return Err(EngineError::InvalidInput("team_name must not be empty".into()));
        }
        if self.index.team_exists(team_name)? {
            return Err(EngineError::InvalidInput(format!("team {team_name} already exists")));
        }
        self.index.create_team(team_name, owner_id, Utc::now())?;
        self.mirror_team(team_name)?;
        let _ = self.audit(
            AuditEventType::TeamCreate,
            owner_id,
            None,
            Some(team_name),
            None,
            "team created",
            true,
            None,
        );
        Ok(TeamSummary { team_name: team_name.to_string(), members: vec![owner_id.to_string()] })
    }

    pub fn team_join(&self, owner_id: &str, team_name: &str) -> Result<TeamSummary> {
        if !self.index.team_exists(team_name)? {
            return Err(EngineError::NotFound(format!("no such team: {team_name}")));
        }
        self.index.join_team(team_name, owner_id)?;
        self.mirror_team(team_name)?;
        let _ = self.audit(
            AuditEventType::TeamJoin,
            owner_id,
            None,
            Some(team_name),
            None,
            "member joined",
            true,
            None,
        );
        Ok(TeamSummary { team_name: team_name.to_string(), members: self.index.team_members(team_name)? })
    }

    pub fn team_leave(&self, owner_id: &str, team_name: &str) -> Result<()> {
        self.index.leave_team(team_name, owner_id)?;
        self.mirror_team(team_name)?;
        let _ = self.audit(
            AuditEventType::TeamLeave,
            owner_id,
            None,
            Some(team_name),
            None,
            "member left",
            true,
            None,
        );
        Ok(())
    }

    /// Rewrites `teams/<team_name>.json` from the index's current state
    /// after a successful membership mutation.
    fn mirror_team(&self, team_name: &str) -> Result<()> {
        if let Some(team) = self.index.get_team(team_name)? {
            self.team_store.write(&team)?;
        }
        Ok(())
    }

    pub fn team_list(&self, team_name: &str) -> Result<TeamSummary> {
        if !self.index.team_exists(team_name)? {
            return Err(EngineError::NotFound(format!("no such team: {team_name}")));
        }
        Ok(TeamSummary { team_name: team_name.to_string(), members: self.index.team_members(team_name)? })
    }
}
