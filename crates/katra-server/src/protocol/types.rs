//! Wire envelope types.
//!
//! Its own stable wire format, not JSON-RPC: a plain serde struct per
//! message part, `From`/constructor helpers, and inline round-trip tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use katra_core::EngineError;

/// Schema version stamped on every envelope.
pub const WIRE_VERSION: &str = "1.0";

fn default_version() -> String {
    WIRE_VERSION.to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

/// `options` block: per-request overrides, all optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for Options {
    fn default() -> Self {
        Self { timeout_ms: 0, dry_run: false, namespace: default_namespace() }
    }
}

/// `metadata` block: stamped by the dispatcher, never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub namespace: String,
}

/// `error` block: `{"code": "<string code>", "message": "<human>", "details": "<optional>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorPayload {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self { code: code.to_string(), message: message.into(), details: None }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new("ERR_PARSE", message)
    }

    pub fn params(message: impl Into<String>) -> Self {
        Self::new("ERR_PARAMS", message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new("ERR_METHOD", format!("no such method: {method}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("ERR_INTERNAL", message)
    }
}

/// Maps an engine failure onto a stable wire error code. One seam,
/// not scattered string matching at each call site.
impl From<&EngineError> for ErrorPayload {
    fn from(err: &EngineError) -> Self {
        let code = match err {
            EngineError::InvalidInput(_) => "ERR_PARAMS",
            EngineError::NotFound(_) => "ERR_NOT_FOUND",
            EngineError::ConsentDenied(_) => "ERR_CONSENT_DENIED",
            EngineError::AccessDenied(_) => "ERR_CONSENT_DENIED",
            EngineError::TierFull(_) => "ERR_TIER_FULL",
            EngineError::Io(_) => "ERR_IO",
            EngineError::Index(_) | EngineError::Serde(_) | EngineError::Internal(_) => "ERR_INTERNAL",
        };
        Self { code: code.to_string(), message: err.to_string(), details: Some(err.kind().to_string()) }
    }
}

/// The shared request/response envelope. Requests leave `result`,
/// `error`, and `metadata` empty; responses fill them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub options: Options,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Envelope {
    /// A request envelope this server cannot even parse far enough to know
    /// its method, paired with a freshly stamped response — used for
    /// `ERR_PARSE` (malformed JSON) and oversize-line rejections.
    pub fn error_response(method: &str, namespace: &str, error: ErrorPayload, started: DateTime<Utc>) -> Self {
        Self {
            version: WIRE_VERSION.to_string(),
            method: method.to_string(),
            params: serde_json::Value::Null,
            options: Options { namespace: namespace.to_string(), ..Default::default() },
            result: None,
            error: Some(error),
            metadata: Some(Metadata {
                request_id: Uuid::new_v4(),
                timestamp: started,
                duration_ms: 0,
                namespace: namespace.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let line = r#"{"version":"1.0","method":"whoami","params":{},"options":{"namespace":"ns1"}}"#;
        let envelope: Envelope = serde_json::from_str(line).unwrap();
        assert_eq!(envelope.method, "whoami");
        assert_eq!(envelope.options.namespace, "ns1");
        assert!(!envelope.options.dry_run);
    }

    #[test]
    fn missing_options_use_defaults() {
        let line = r#"{"version":"1.0","method":"whoami","params":{}}"#;
        let envelope: Envelope = serde_json::from_str(line).unwrap();
        assert_eq!(envelope.options.namespace, "default");
        assert_eq!(envelope.options.timeout_ms, 0);
    }

    #[test]
    fn engine_error_maps_to_stable_code() {
        let err = EngineError::ConsentDenied("no".into());
        let payload = ErrorPayload::from(&err);
        assert_eq!(payload.code, "ERR_CONSENT_DENIED");
    }
}
