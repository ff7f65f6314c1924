//! `say`, `hear`, `hear_all`, `who_is_here`, `share_with`.

use chrono::Utc;

use crate::error::Result;
use crate::mailbox::{DrainResult, HearResult, HeardMessage};
use crate::session::Session;

use super::Engine;

pub struct HearOutcome {
    pub message: Option<HeardMessage>,
}

pub struct HearAllOutcome {
    pub messages: Vec<HeardMessage>,
    pub more_remain: bool,
    pub lost_messages: bool,
}

impl From<DrainResult> for HearAllOutcome {
    fn from(result: DrainResult) -> Self {
        Self {
            messages: result.messages,
            more_remain: result.more_remain,
            lost_messages: result.lost_messages,
        }
    }
}

impl Engine {
    /// `say(message)`: broadcasts to every known owner, or only to the
    /// recipients a prior `share_with` scoped for this turn.
    pub fn say(&self, session: &mut Session, message: &str) -> Result<()> {
        let recipients = session.pending_share_with.take();
        self.mailbox.say(&session.owner_id, message, recipients.as_deref(), Utc::now())
    }

    /// `share_with(ci_ids)`: scopes the next `say` call to only these
    /// recipients. Cleared automatically once consumed.
    pub fn share_with(&self, session: &mut Session, ci_ids: Vec<String>) {
        session.pending_share_with = Some(ci_ids);
    }

    pub fn hear(&self, owner_id: &str, last_seen_seq: u64) -> Result<HearOutcome> {
        let message = match self.mailbox.hear(owner_id, last_seen_seq)? {
            HearResult::Message(msg) => Some(msg),
            HearResult::NoNewMessages => None,
        };
        Ok(HearOutcome { message })
    }

    pub fn hear_all(&self, owner_id: &str, max_count: usize) -> Result<HearAllOutcome> {
        Ok(self.mailbox.hear_all(owner_id, max_count)?.into())
    }

    pub fn who_is_here(&self) -> Result<Vec<String>> {
        self.mailbox.who_is_here()
    }
}
