//! TCP transport: line-based envelopes, a literal `GET /health`
//! probe, a hard cap on concurrent clients, and cooperative shutdown on
//! SIGTERM/SIGINT. Same read/write-loop shape as `protocol::unix`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::protocol::types::{Envelope, ErrorPayload};
use crate::protocol::MAX_LINE_BYTES;
use crate::server::ServerState;

const HEALTH_RESPONSE: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 15\r\nConnection: close\r\n\r\n{\"status\":\"ok\"}";

/// `prev_active` is the counter's value *before* the connection being
/// judged was added to it, per `AtomicUsize::fetch_add`'s return value.
fn over_capacity(prev_active: usize, max_clients: usize) -> bool {
    prev_active >= max_clients
}

pub async fn run(state: Arc<ServerState>, bind_addr: SocketAddr, max_clients: usize) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{bind_addr} already in use"))
        } else {
            e
        }
    })?;
    info!(addr = %bind_addr, max_clients, "tcp listening");

    let active = Arc::new(AtomicUsize::new(0));

    loop {
        if state.is_shutting_down() {
            break;
        }
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "tcp accept failed");
                        continue;
                    }
                };
                if over_capacity(active.fetch_add(1, Ordering::SeqCst), max_clients) {
                    active.fetch_sub(1, Ordering::SeqCst);
                    debug!(%peer, max_clients, "tcp connection rejected: at capacity");
                    drop(stream);
                    continue;
                }
                let state = state.clone();
                let active = active.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(state, stream).await {
                        error!(%peer, error = %e, "tcp connection ended with error");
                    }
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
    Ok(())
}

async fn handle_connection(state: Arc<ServerState>, stream: TcpStream) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let Some(first_line) = lines.next_line().await? else {
        return Ok(());
    };
    if first_line.trim() == "GET /health" {
        write_half.write_all(HEALTH_RESPONSE.as_bytes()).await?;
        write_half.flush().await?;
        return Ok(());
    }

    let mut session = {
        let engine = state.engine.lock().expect("engine lock poisoned");
        engine.new_session()
    };

    let mut line = Some(first_line);
    loop {
        let current = match line.take() {
            Some(l) => l,
            None => match lines.next_line().await? {
                Some(l) => l,
                None => break,
            },
        };
        if current.is_empty() {
            continue;
        }

        let response = if current.len() > MAX_LINE_BYTES {
            warn!(len = current.len(), "tcp line exceeds max length, rejecting");
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
                let r = crate::dispatch::process(&state, &mut owned_session, &current);
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
        debug!(bytes = text.len(), "tcp response");
        write_half.write_all(text.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_up_to_the_configured_cap() {
        // fetch_add returns the pre-increment value: a connection that
        // lands exactly on the cap is the one that tips it over.
        assert!(!over_capacity(0, 32));
        assert!(!over_capacity(31, 32));
        assert!(over_capacity(32, 32));
        assert!(over_capacity(100, 32));
    }
}
