//! Engine error types.
//!
//! Every fallible engine operation returns [`EngineError`]. The dispatcher
//! (in the `katra-server` crate) maps each variant onto one of the stable
//! wire error codes from the envelope spec; this module owns the variants,
//! not the wire mapping.

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine-level error.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A required field was missing, empty, or out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested record, team, or digest does not exist (or is not
    /// visible to the requester).
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation that requires explicit consent was attempted without it.
    #[error("consent denied: {0}")]
    ConsentDenied(String),

    /// Access control denied the read or mutation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A daily hot-tier or warm-tier file has reached its size cap.
    #[error("tier full: {0}")]
    TierFull(String),

    /// Underlying filesystem I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The secondary index (SQLite) failed.
    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// An invariant the engine relies on was violated; this indicates a bug
    /// or on-disk corruption, not a caller error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable short classification used for logging and for the dispatcher's
    /// wire-code mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::NotFound(_) => "not_found",
            EngineError::ConsentDenied(_) => "consent_denied",
            EngineError::AccessDenied(_) => "access_denied",
            EngineError::TierFull(_) => "tier_full",
            EngineError::Io(_) => "io",
            EngineError::Index(_) => "index",
            EngineError::Serde(_) => "serde",
            EngineError::Internal(_) => "internal",
        }
    }
}
