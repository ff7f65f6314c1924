//! The dispatcher: the envelope-handling algorithm plus the method registry.
//!
//! Method dispatch and uniform success/error wrapping collapse into one
//! `registry()` table since the method set is fixed, not user-extensible.

mod handlers;

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use katra_core::engine::Engine;
use katra_core::error::EngineError;
use katra_core::session::Session;
use uuid::Uuid;

use crate::protocol::types::{Envelope, ErrorPayload, Metadata, Options};
use crate::server::ServerState;

/// One dispatcher-table entry. Plain function pointers, not closures — the
/// registry is built once at startup and never mutated.
pub type HandlerFn = fn(&Engine, &mut Session, serde_json::Value) -> Result<serde_json::Value, EngineError>;

thread_local! {
    /// Set for the duration of one handler invocation. Nothing
    /// in the engine currently reads this — no operation is namespace-scoped
    /// yet — but the slot exists so a future namespaced store can read it
    /// without threading an extra parameter through every handler.
    static NAMESPACE: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Current request's `options.namespace`, valid only while a handler runs.
pub fn current_namespace() -> String {
    NAMESPACE.with(|n| n.borrow().clone())
}

/// Builds the fixed method → handler table.
pub fn registry() -> HashMap<&'static str, HandlerFn> {
    let mut m: HashMap<&'static str, HandlerFn> = HashMap::new();
    m.insert("remember", handlers::remember);
    m.insert("learn", handlers::learn);
    m.insert("decide", handlers::decide);
    m.insert("recall", handlers::recall);
    m.insert("recent", handlers::recent);
    m.insert("memory_digest", handlers::memory_digest);
    m.insert("register", handlers::register);
    m.insert("whoami", handlers::whoami);
    m.insert("status", handlers::status);
    m.insert("update_metadata", handlers::update_metadata);
    m.insert("team_create", handlers::team_create);
    m.insert("team_join", handlers::team_join);
    m.insert("team_leave", handlers::team_leave);
    m.insert("team_list", handlers::team_list);
    m.insert("set_isolation", handlers::set_isolation);
    m.insert("share_with", handlers::share_with);
    m.insert("say", handlers::say);
    m.insert("hear", handlers::hear);
    m.insert("hear_all", handlers::hear_all);
    m.insert("who_is_here", handlers::who_is_here);
    m.insert("archive", handlers::archive);
    m.insert("fade", handlers::fade);
    m.insert("forget", handlers::forget);
    m.insert("forget_by_pattern", handlers::forget_by_pattern);
    m.insert("review_turn", handlers::review_turn);
    m.insert("consolidation_run", handlers::consolidation_run);
    m.insert("consolidation_insights", handlers::consolidation_insights);
    m.insert("consolidation_acknowledge", handlers::consolidation_acknowledge);
    m
}

/// Runs the envelope-handling algorithm over one already-length-checked
/// request line, for one connection's `Session`.
pub fn process(state: &ServerState, session: &mut Session, line: &str) -> Envelope {
    let started = Utc::now();

    // Steps 1-2: parse JSON, extract method.
    let request: Envelope = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Envelope::error_response("", "default", ErrorPayload::parse_error(e.to_string()), started),
    };
    if request.method.is_empty() {
        return Envelope::error_response("", &request.options.namespace, ErrorPayload::params("missing method"), started);
    }

    // Step 3: options already parsed with defaults by serde.
    let Options { dry_run, namespace, .. } = request.options.clone();

    // Step 4: resolve handler.
    let Some(handler) = state.registry.get(request.method.as_str()).copied() else {
        return respond(&request, started, Err(ErrorPayload::method_not_found(&request.method)));
    };

    // Step 5: dry_run short-circuits before the handler ever runs.
    if dry_run {
        let result = serde_json::json!({ "dry_run": true, "method": request.method });
        return respond_ok(&request, started, result);
    }

    // Step 6: thread-local namespace for the duration of the call.
    NAMESPACE.with(|n| *n.borrow_mut() = namespace);

    // Step 7: acquire the global engine lock.
    let elapsed_start = Instant::now();
    let outcome = {
        let engine = match state.engine.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Step 8: invoke handler, timed.
        handler(&engine, session, request.params.clone())
    };
    // Step 10: lock released at end of the block above.
    let duration_ms = elapsed_start.elapsed().as_millis() as u64;

    match outcome {
        Ok(result) => respond_ok_timed(&request, started, duration_ms, result),
        Err(e) => respond_timed(&request, started, duration_ms, Err(ErrorPayload::from(&e))),
    }
}

#[cfg(test)]
mod tests {
    use katra_core::config::CoreConfig;

    use super::*;

    fn state() -> (tempfile::TempDir, ServerState) {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = Engine::open(CoreConfig::new(dir.path().to_path_buf())).unwrap();
        (dir, ServerState { engine: std::sync::Mutex::new(engine), registry: registry(), shutdown: std::sync::atomic::AtomicBool::new(false) })
    }

    #[test]
    fn envelope_round_trip_for_a_known_method() {
        let (_dir, state) = state();
        let mut session = state.engine.lock().unwrap().new_session();
        let request = r#"{"version":"1.0","method":"register","params":{"name":"Nyx"}}"#;
        let response = process(&state, &mut session, request);
        assert_eq!(response.method, "register");
        assert!(response.error.is_none());
        assert!(response.result.is_some());
        assert!(response.metadata.is_some());
    }

    #[test]
    fn unknown_method_maps_to_err_method() {
        let (_dir, state) = state();
        let mut session = state.engine.lock().unwrap().new_session();
        let request = r#"{"version":"1.0","method":"not_a_real_method","params":{}}"#;
        let response = process(&state, &mut session, request);
        assert_eq!(response.error.as_ref().map(|e| e.code.as_str()), Some("ERR_METHOD"));
    }

    #[test]
    fn malformed_json_maps_to_err_parse() {
        let (_dir, state) = state();
        let mut session = state.engine.lock().unwrap().new_session();
        let response = process(&state, &mut session, "not json at all");
        assert_eq!(response.error.as_ref().map(|e| e.code.as_str()), Some("ERR_PARSE"));
    }

    #[test]
    fn dry_run_short_circuits_without_touching_the_engine() {
        let (_dir, state) = state();
        let mut session = state.engine.lock().unwrap().new_session();
        let request = r#"{"version":"1.0","method":"register","params":{"name":"Nyx"},"options":{"dryRun":true}}"#;
        let response = process(&state, &mut session, request);
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["dry_run"], serde_json::json!(true));
        // the session was never actually registered
        assert!(!session.registered);
    }
}

fn respond_ok(request: &Envelope, started: chrono::DateTime<Utc>, result: serde_json::Value) -> Envelope {
    respond_ok_timed(request, started, 0, result)
}

fn respond(request: &Envelope, started: chrono::DateTime<Utc>, outcome: Result<serde_json::Value, ErrorPayload>) -> Envelope {
    respond_timed(request, started, 0, outcome)
}

fn respond_ok_timed(request: &Envelope, started: chrono::DateTime<Utc>, duration_ms: u64, result: serde_json::Value) -> Envelope {
    respond_timed(request, started, duration_ms, Ok(result))
}

// Step 9: stamps response metadata regardless of success or failure.
fn respond_timed(
    request: &Envelope,
    started: chrono::DateTime<Utc>,
    duration_ms: u64,
    outcome: Result<serde_json::Value, ErrorPayload>,
) -> Envelope {
    let metadata = Metadata {
        request_id: Uuid::new_v4(),
        timestamp: started,
        duration_ms,
        namespace: request.options.namespace.clone(),
    };
    match outcome {
        Ok(result) => Envelope {
            version: request.version.clone(),
            method: request.method.clone(),
            params: serde_json::Value::Null,
            options: request.options.clone(),
            result: Some(result),
            error: None,
            metadata: Some(metadata),
        },
        Err(error) => Envelope {
            version: request.version.clone(),
            method: request.method.clone(),
            params: serde_json::Value::Null,
            options: request.options.clone(),
            result: None,
            error: Some(error),
            metadata: Some(metadata),
        },
    }
}
