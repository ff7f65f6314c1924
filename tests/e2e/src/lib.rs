//! Test harness shared by the journey tests in `tests/journeys.rs`.
//!
//! An isolated, temp-dir-backed engine instance per test, torn down
//! automatically on drop.

use katra_core::config::CoreConfig;
use katra_core::engine::Engine;
use tempfile::TempDir;

/// An `Engine` rooted in a fresh temporary directory. The directory is
/// deleted when the harness drops.
pub struct Harness {
    pub engine: Engine,
    _root: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let root = TempDir::new().expect("failed to create temp dir");
        let engine = Engine::open(CoreConfig::new(root.path().to_path_buf())).expect("failed to open engine");
        Self { engine, _root: root }
    }

    /// Registers a fresh session under `name` and returns it alongside the
    /// owner_id the engine minted.
    pub fn register(&self, name: &str) -> (katra_core::Session, String) {
        let mut session = self.engine.new_session();
        self.engine.register(&mut session, name, None).expect("register failed");
        let owner_id = session.owner_id.clone();
        (session, owner_id)
    }

    /// Counts audit rows of `event_type` in the engine's audit log.
    pub fn audit_count(&self, event_type: katra_core::memory::AuditEventType) -> usize {
        let mut count = 0;
        katra_core::jsonl::scan_file::<katra_core::memory::AuditRecord, _>(
            &self.engine.config().audit_log_path(),
            |entry| {
                if entry.event_type == event_type {
                    count += 1;
                }
                true
            },
        )
        .expect("failed to scan audit log");
        count
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
