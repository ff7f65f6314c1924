//! Top-level server errors and their process exit codes.
//!
//! One `thiserror` enum for the binary; `main.rs` maps each variant to its
//! documented exit status rather than always exiting 1.

use thiserror::Error;

pub type ServerResult<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no root directory given: pass --root, --data-dir, or set KATRA_ROOT")]
    MissingRoot,

    #[error("address already in use: {0}")]
    PortInUse(String),

    #[error("engine initialization failed: {0}")]
    Init(#[from] katra_core::error::EngineError),

    #[error("transport failed: {0}")]
    Transport(#[from] std::io::Error),
}

impl ServerError {
    /// Maps to the documented process exit codes.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServerError::MissingRoot => 1,
            ServerError::PortInUse(_) => 2,
            ServerError::Init(_) | ServerError::Transport(_) => 3,
        }
    }
}
