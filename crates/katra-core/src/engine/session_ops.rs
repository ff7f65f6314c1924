//! `register`, `whoami`, `status`, `update_metadata`, `set_isolation`,
//! `share_with`, `review_turn`.

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::memory::{AuditEventType, Isolation, RecordType, RememberInput};
use crate::session::Session;

use super::Engine;

pub struct RegisterOutcome {
    pub owner_id: String,
    pub onboarding: Option<&'static str>,
}

pub struct StatusOutcome {
    pub chosen_name: String,
    pub owner_id: String,
    pub registered: bool,
    pub memories_added: u64,
    pub queries_processed: u64,
}

const ONBOARDING_PREAMBLE: &str =
    "Welcome. Memories you store here persist across sessions under your chosen name.";

impl Engine {
    /// `register(name, role)`: mints or looks up a stable `owner_id`,
    /// archives the prior session's turn (best-effort digest), starts a
    /// fresh session, and records a welcome memory.
    pub fn register(&self, session: &mut Session, name: &str, role: Option<String>) -> Result<RegisterOutcome> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput("name must not be empty".into()));
        }
        let owner_id = self.registry.resolve_owner(&self.index, name)?;

        let now = Utc::now();
        let was_first_call = session.first_call;
        *session = Session::new(now);
        session.chosen_name = name.to_string();
        session.owner_id = owner_id.clone();
        session.role = role;
        session.registered = true;
        session.first_call = was_first_call;

        let welcome = RememberInput {
            content: format!("{name} registered"),
            record_type: Some(RecordType::Interaction),
            importance: Some(0.1),
            response: None,
            context: None,
            component: None,
            tags: vec!["welcome".into()],
            emotion_intensity: 0.0,
            emotion_type: None,
            context_question: None,
            context_resolution: None,
            context_uncertainty: None,
            related_to: vec![],
            marked_important: false,
        };
        self.remember(session, welcome, RecordType::Interaction, Isolation::Private, None)?;

        let onboarding = if was_first_call {
            session.first_call = false;
            Some(ONBOARDING_PREAMBLE)
        } else {
            None
        };

        self.mailbox.register(&owner_id)?;

        Ok(RegisterOutcome { owner_id, onboarding })
    }

    pub fn whoami(&self, session: &Session) -> StatusOutcome {
        self.status(session)
    }

    pub fn status(&self, session: &Session) -> StatusOutcome {
        StatusOutcome {
            chosen_name: session.chosen_name.clone(),
            owner_id: session.owner_id.clone(),
            registered: session.registered,
            memories_added: session.memories_added,
            queries_processed: session.queries_processed,
        }
    }

    /// `update_metadata`: owner-only adjustment of `marked_important` /
    /// `marked_forgettable` / `archived_not_allowed` overrides on an
    /// existing record.
    pub fn update_metadata(
        &self,
        requester_id: &str,
        record_id: &str,
        marked_important: Option<bool>,
        marked_forgettable: Option<bool>,
        archived_not_allowed: Option<bool>,
    ) -> Result<()> {
        let row = self
            .index
            .get(record_id)?
            .ok_or_else(|| EngineError::NotFound(format!("no such record: {record_id}")))?;
        if row.owner_id != requester_id {
            return Err(EngineError::AccessDenied("only the owner may update metadata".into()));
        }
        self.index.set_flags(record_id, marked_important, marked_forgettable, archived_not_allowed)?;
        Ok(())
    }

    /// `set_isolation`: re-points isolation/team_name on the index row.
    /// The hot tier's JSONL line is never rewritten; the index is
    /// authoritative for this field from here on (see `hydrate`).
    pub fn set_isolation(
        &self,
        requester_id: &str,
        record_id: &str,
        isolation: Isolation,
        team_name: Option<String>,
    ) -> Result<()> {
        if isolation == Isolation::Team && team_name.is_none() {
            return Err(EngineError::InvalidInput(
                "team_name is required when isolation is team".into(),
            ));
        }
        let row = self
            .index
            .get(record_id)?
            .ok_or_else(|| EngineError::NotFound(format!("no such record: {record_id}")))?;
        if row.owner_id != requester_id {
            return Err(EngineError::AccessDenied("only the owner may change isolation".into()));
        }

        self.index.set_isolation(record_id, isolation, team_name.as_deref())?;
        Ok(())
    }

    /// `review_turn`: returns and clears the session's per-turn record list.
    pub fn review_turn(&self, session: &mut Session) -> Vec<String> {
        session.take_turn_ids()
    }
}
