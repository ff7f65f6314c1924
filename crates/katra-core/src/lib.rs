//! # Katra Core
//!
//! Persistent, multi-tenant memory substrate for long-running conversational
//! agents. A tiered store — hot-tier JSONL, a SQLite secondary index, and a
//! warm-tier digest archive — behind an access-controlled, audited engine.
//!
//! - **Hot tier**: append-only daily JSONL files, one per owner-day, the
//!   authoritative record of what was ever remembered.
//! - **Secondary index**: SQLite + FTS5, mirroring the hot tier for fast
//!   recall and carrying every field an engine mutation can change after the
//!   fact (importance, archival, isolation, access bookkeeping). Hippocampal
//!   indexing, in Teyler & Rudy's sense: the index stores pointers and
//!   mutable attributes, the hot tier stores content.
//! - **Warm tier**: periodic digest records written by the consolidation
//!   pipeline, grouping and summarizing records the index has archived out
//!   of hot-tier circulation.
//! - **Access control**: PRIVATE/TEAM/PUBLIC isolation per record, every
//!   access decision and lifecycle mutation appended to a hash-chained,
//!   tamper-evident audit log.
//! - **Mailbox**: a bounded per-owner FIFO for direct agent-to-agent
//!   messages, independent of the memory stores.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use katra_core::config::CoreConfig;
//! use katra_core::engine::Engine;
//! use katra_core::memory::{Isolation, RecordType, RememberInput};
//!
//! let engine = Engine::open(CoreConfig::new("/tmp/katra".into()))?;
//! let mut session = engine.new_session();
//! engine.register(&mut session, "Nyx", None)?;
//!
//! let input = RememberInput { content: "prefers terse commit messages".into(), ..Default::default() };
//! engine.remember(&mut session, input, RecordType::Knowledge, Isolation::Private, None)?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod access;
pub mod config;
pub mod consolidation;
pub mod digest_store;
pub mod engine;
pub mod error;
pub mod hot_tier;
pub mod index;
pub mod jsonl;
pub mod mailbox;
pub mod memory;
pub mod session;

pub use config::CoreConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use memory::{Isolation, MemoryRecord, RecallInput, RecordType, RememberInput};
pub use session::Session;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::config::CoreConfig;
    pub use crate::engine::Engine;
    pub use crate::error::{EngineError, Result};
    pub use crate::memory::{Isolation, MemoryRecord, RecallInput, RecordType, RememberInput};
    pub use crate::session::Session;
}
