//! stdio transport: newline-delimited envelopes on stdin/stdout.
//! EOF ends the process. One `Session` for the whole connection: a
//! `BufRead::lines()` loop over stdin, serialize-and-flush per response,
//! synchronous rather than `async` since the engine it calls into never
//! yields.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::protocol::types::{Envelope, ErrorPayload};
use crate::protocol::MAX_LINE_BYTES;
use crate::server::ServerState;

/// Blocking: run on `tokio::task::spawn_blocking`, never on the async
/// runtime directly.
pub fn run(state: Arc<ServerState>) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let reader = BufReader::new(stdin.lock());
    let mut stdout = stdout.lock();
    let mut session = state.engine.lock().expect("engine lock poisoned").new_session();

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "stdio read failed");
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        if state.is_shutting_down() {
            break;
        }

        let response = if line.len() > MAX_LINE_BYTES {
            warn!(len = line.len(), "stdio line exceeds max length, rejecting");
            Envelope::error_response(
                "",
                "default",
                ErrorPayload::parse_error("request line exceeds 32KiB"),
                chrono::Utc::now(),
            )
        } else {
            crate::dispatch::process(&state, &mut session, &line)
        };

        match serde_json::to_string(&response) {
            Ok(text) => {
                debug!(bytes = text.len(), "stdio response");
                writeln!(stdout, "{text}")?;
                stdout.flush()?;
            }
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                let fallback = r#"{"version":"1.0","method":"","error":{"code":"ERR_INTERNAL","message":"failed to serialize response"}}"#;
                let _ = writeln!(stdout, "{fallback}");
                let _ = stdout.flush();
            }
        }
    }

    Ok(())
}
