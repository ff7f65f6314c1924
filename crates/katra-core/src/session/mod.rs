//! Session Registry: per-connection transient state and owner_id minting.
//!
//! Session state belongs to the transport connection, not the engine; the
//! engine only mints and remembers the stable `owner_id` a display name
//! resolves to. The "current session" is modeled as a context value threaded
//! through dispatcher calls rather than real thread-local storage, so
//! `Session` carries no interior mutability of its own.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::index::Index;

/// Per-connection transient state. Lives for the lifetime of one transport
/// connection; never shared across connections.
#[derive(Debug, Clone)]
pub struct Session {
    pub chosen_name: String,
    pub owner_id: String,
    pub role: Option<String>,
    pub registered: bool,
    pub first_call: bool,
    pub connected_at: DateTime<Utc>,
    pub memories_added: u64,
    pub queries_processed: u64,
    pub last_activity: DateTime<Utc>,
    pub per_turn_ids: Vec<String>,
    pub per_session_ids: Vec<String>,
    /// Recipients scoped by a `share_with` call on the prior turn; consumed
    /// and cleared by the next `say`.
    pub pending_share_with: Option<Vec<String>>,
}

impl Session {
    /// Fresh, unregistered session bound at connection time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            chosen_name: "Katra".to_string(),
            owner_id: String::new(),
            role: None,
            registered: false,
            first_call: true,
            connected_at: now,
            memories_added: 0,
            queries_processed: 0,
            last_activity: now,
            per_turn_ids: Vec::new(),
            per_session_ids: Vec::new(),
            pending_share_with: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn note_stored(&mut self, record_id: String) {
        self.memories_added += 1;
        self.per_turn_ids.push(record_id.clone());
        self.per_session_ids.push(record_id);
    }

    pub fn note_query(&mut self) {
        self.queries_processed += 1;
    }

    /// `review_turn`: returns and clears the per-turn list.
    pub fn take_turn_ids(&mut self) -> Vec<String> {
        std::mem::take(&mut self.per_turn_ids)
    }
}

/// Maps a chosen display name to a stable `owner_id`, minting one on first
/// use. The in-memory map is a per-process cache; the `owner_registry` table
/// in the index is the durable store, so a name resolves to the same
/// `owner_id` after a restart instead of a fresh one being minted.
pub struct Registry {
    names_to_owners: Mutex<HashMap<String, String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { names_to_owners: Mutex::new(HashMap::new()) }
    }

    /// Looks up or mints a stable `owner_id` for `name`, consulting the
    /// in-memory cache first, then the index, and finally minting and
    /// persisting a fresh `owner_id` if neither has seen `name` before.
    pub fn resolve_owner(&self, index: &Index, name: &str) -> Result<String> {
        let mut map = self
            .names_to_owners
            .lock()
            .map_err(|_| EngineError::Internal("session registry lock poisoned".into()))?;
        if let Some(owner_id) = map.get(name) {
            return Ok(owner_id.clone());
        }
        if let Some(owner_id) = index.resolve_owner_name(name)? {
            map.insert(name.to_string(), owner_id.clone());
            return Ok(owner_id);
        }
        let owner_id = Uuid::new_v4().to_string();
        index.insert_owner_name(name, &owner_id)?;
        map.insert(name.to_string(), owner_id.clone());
        Ok(owner_id)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
