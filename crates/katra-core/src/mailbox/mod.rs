//! Inter-agent mailbox: a bounded FIFO per owner, fanned out by `say`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default per-owner queue depth before the oldest entry is dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// One message as delivered to `hear`/`hear_all`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeardMessage {
    pub seq: u64,
    pub from: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

struct Inbox {
    queue: VecDeque<HeardMessage>,
    next_seq: u64,
    lost_messages: bool,
}

impl Inbox {
    fn new() -> Self {
        Self { queue: VecDeque::new(), next_seq: 1, lost_messages: false }
    }

    fn push(&mut self, from: &str, message: &str, now: DateTime<Utc>, capacity: usize) {
        if self.queue.len() >= capacity {
            self.queue.pop_front();
            self.lost_messages = true;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back(HeardMessage {
            seq,
            from: from.to_string(),
            message: message.to_string(),
            timestamp: now,
        });
    }
}

/// Result of `hear(last_seen_seq)`.
pub enum HearResult {
    Message(HeardMessage),
    NoNewMessages,
}

/// Result of `hear_all(max_count)`.
pub struct DrainResult {
    pub messages: Vec<HeardMessage>,
    pub more_remain: bool,
    pub lost_messages: bool,
}

/// A single in-process structure mapping `owner_id -> bounded FIFO`.
pub struct Mailbox {
    inboxes: Mutex<HashMap<String, Inbox>>,
    capacity: usize,
}

impl Mailbox {
    pub fn new(capacity: usize) -> Self {
        Self { inboxes: Mutex::new(HashMap::new()), capacity }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Inbox>>> {
        self.inboxes
            .lock()
            .map_err(|_| EngineError::Internal("mailbox lock poisoned".into()))
    }

    /// Fans `message` out to every known recipient, or only to
    /// `recipients` when `share_with` scoped the prior turn.
    pub fn say(
        &self,
        from: &str,
        message: &str,
        recipients: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inboxes = self.lock()?;
        let targets: Vec<String> = match recipients {
            Some(ids) => ids.to_vec(),
            None => {
                let mut all: Vec<String> = inboxes.keys().cloned().collect();
                if !all.iter().any(|o| o == from) {
                    all.push(from.to_string());
                }
                all
            }
        };
        for target in targets {
            if target == from {
                continue;
            }
            let inbox = inboxes.entry(target).or_insert_with(Inbox::new);
            inbox.push(from, message, now, self.capacity);
        }
        Ok(())
    }

    /// Returns the next undelivered message for `owner_id` after
    /// `last_seen_seq`, or `NoNewMessages`.
    pub fn hear(&self, owner_id: &str, last_seen_seq: u64) -> Result<HearResult> {
        let inboxes = self.lock()?;
        let Some(inbox) = inboxes.get(owner_id) else {
            return Ok(HearResult::NoNewMessages);
        };
        let next = inbox.queue.iter().find(|m| m.seq > last_seen_seq);
        Ok(match next {
            Some(msg) => HearResult::Message(msg.clone()),
            None => HearResult::NoNewMessages,
        })
    }

    /// Drains up to `max_count` messages for `owner_id`.
    pub fn hear_all(&self, owner_id: &str, max_count: usize) -> Result<DrainResult> {
        let mut inboxes = self.lock()?;
        let Some(inbox) = inboxes.get_mut(owner_id) else {
            return Ok(DrainResult { messages: Vec::new(), more_remain: false, lost_messages: false });
        };
        let mut messages = Vec::new();
        while messages.len() < max_count {
            match inbox.queue.pop_front() {
                Some(msg) => messages.push(msg),
                None => break,
            }
        }
        let more_remain = !inbox.queue.is_empty();
        let lost_messages = inbox.lost_messages;
        inbox.lost_messages = false;
        Ok(DrainResult { messages, more_remain, lost_messages })
    }

    /// `who_is_here`: the set of owners with a live inbox (registered at
    /// least once this process lifetime).
    pub fn who_is_here(&self) -> Result<Vec<String>> {
        let inboxes = self.lock()?;
        Ok(inboxes.keys().cloned().collect())
    }

    /// Ensures `owner_id` has an inbox, so it receives future broadcast
    /// `say` calls even before it has sent anything itself.
    pub fn register(&self, owner_id: &str) -> Result<()> {
        let mut inboxes = self.lock()?;
        inboxes.entry(owner_id.to_string()).or_insert_with(Inbox::new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn say_fans_out_to_all_known_owners() {
        let mailbox = Mailbox::new(DEFAULT_QUEUE_CAPACITY);
        mailbox.register("nyx").unwrap();
        mailbox.register("echo").unwrap();
        mailbox.say("nyx", "hello team", None, Utc::now()).unwrap();

        let drained = mailbox.hear_all("echo", 10).unwrap();
        assert_eq!(drained.messages.len(), 1);
        assert_eq!(drained.messages[0].message, "hello team");
    }

    #[test]
    fn say_never_delivers_to_sender() {
        let mailbox = Mailbox::new(DEFAULT_QUEUE_CAPACITY);
        mailbox.register("nyx").unwrap();
        mailbox.say("nyx", "note to self?", None, Utc::now()).unwrap();
        let drained = mailbox.hear_all("nyx", 10).unwrap();
        assert!(drained.messages.is_empty());
    }

    #[test]
    fn share_with_scopes_delivery() {
        let mailbox = Mailbox::new(DEFAULT_QUEUE_CAPACITY);
        mailbox.register("nyx").unwrap();
        mailbox.register("echo").unwrap();
        mailbox.register("carol").unwrap();
        mailbox
            .say("nyx", "just for echo", Some(&["echo".to_string()]), Utc::now())
            .unwrap();

        assert_eq!(mailbox.hear_all("echo", 10).unwrap().messages.len(), 1);
        assert!(mailbox.hear_all("carol", 10).unwrap().messages.is_empty());
    }

    #[test]
    fn hear_returns_no_new_messages_once_caught_up() {
        let mailbox = Mailbox::new(DEFAULT_QUEUE_CAPACITY);
        mailbox.register("nyx").unwrap();
        mailbox.register("echo").unwrap();
        mailbox.say("nyx", "one", None, Utc::now()).unwrap();

        let first = mailbox.hear("echo", 0).unwrap();
        let seq = match first {
            HearResult::Message(m) => m.seq,
            HearResult::NoNewMessages => panic!("expected a message"),
        };
        assert!(matches!(mailbox.hear("echo", seq).unwrap(), HearResult::NoNewMessages));
    }

    #[test]
    fn overrun_queue_sets_lost_message_flag() {
        let mailbox = Mailbox::new(2);
        mailbox.register("nyx").unwrap();
        mailbox.register("echo").unwrap();
        for i in 0..5 {
            mailbox.say("nyx", &format!("msg {i}"), None, Utc::now()).unwrap();
        }
        let drained = mailbox.hear_all("echo", 10).unwrap();
        assert!(drained.lost_messages);
        assert_eq!(drained.messages.len(), 2);
    }
}
