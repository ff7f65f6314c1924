//! Unix domain socket transport: one line = one request per connection,
//! each connection its own session. Same read/write-loop shape as the
//! stdio transport, carried over a `tokio::net::UnixListener` accept loop.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::protocol::types::{Envelope, ErrorPayload};
use crate::protocol::MAX_LINE_BYTES;
use crate::server::ServerState;

pub async fn run(state: Arc<ServerState>, socket_path: &Path) -> std::io::Result<()> {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "unix socket listening");

    loop {
        if state.is_shutting_down() {
            break;
        }
        let (stream, _addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "unix accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(state, stream).await {
                error!(error = %e, "unix connection ended with error");
            }
        });
    }
    Ok(())
}

async fn handle_connection(state: Arc<ServerState>, stream: UnixStream) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut session = {
        let engine = state.engine.lock().expect("engine lock poisoned");
        engine.new_session()
    };

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        let response = if line.len() > MAX_LINE_BYTES {
            warn!(len = line.len(), "unix line exceeds max length, rejecting");
            Envelope::error_response(
                "",
                "default",
                ErrorPayload::parse_error("request line exceeds 32KiB"),
                chrono::Utc::now(),
            )
        } else {
            let state = state.clone();
            let mut owned_session = session;
            let (response, returned_session) = tokio::task::spawn_blocking(move || {
                let r = crate::dispatch::process(&state, &mut owned_session, &line);
                (r, owned_session)
            })
            .await
            .map_err(|e| std::io::Error::other(format!("dispatch task panicked: {e}")))?;
            session = returned_session;
            response
        };

        let text = serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"version":"1.0","method":"","error":{"code":"ERR_INTERNAL","message":"failed to serialize response"}}"#.to_string()
        });
        debug!(bytes = text.len(), "unix response");
        write_half.write_all(text.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;
    }
    Ok(())
}
