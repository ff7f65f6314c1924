//! Katra: a persistent, multi-tenant memory substrate for long-running
//! conversational agents, served over stdio, a Unix socket, and/or TCP.
//!
//! Wiring order: parse CLI before touching logging (so `--help`/`--version`
//! print cleanly), initialize tracing, open the engine, spawn the
//! background consolidation loop, then spawn the requested transport(s)
//! and block on them.

mod config;
mod dispatch;
mod error;
mod protocol;
mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{Config, TransportMode};
use error::ServerError;
use katra_core::engine::Engine;
use server::ServerState;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("katra: {e}");
            std::process::exit(e.exit_code());
        }
    };

    init_logging();
    info!("katra v{} starting", env!("CARGO_PKG_VERSION"));

    let engine = match Engine::open(config.core.clone()) {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "engine initialization failed");
            std::process::exit(3);
        }
    };

    let state = ServerState::new(engine);
    server::spawn_consolidation_scheduler(state.clone(), config.consolidation_interval_hours);
    spawn_shutdown_listener(state.clone());

    match run_transports(state, &config).await {
        Ok(()) => {
            info!("katra shutting down");
            std::process::exit(0);
        }
        Err(e) => {
            error!(error = %e, "server exited with error");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run_transports(state: Arc<ServerState>, config: &Config) -> Result<(), ServerError> {
    match config.transport {
        TransportMode::Stdio => run_stdio(state).await,
        TransportMode::Unix => run_unix(state, &config.unix_socket).await,
        TransportMode::Tcp => run_tcp(state, &config.tcp_bind, config.tcp_port, config.max_clients).await,
        TransportMode::All => {
            let unix_path = config.unix_socket.clone();
            let tcp_bind = config.tcp_bind.clone();
            let tcp_port = config.tcp_port;
            let max_clients = config.max_clients;

            let (stdio_result, unix_result, tcp_result) = tokio::join!(
                run_stdio(state.clone()),
                run_unix(state.clone(), &unix_path),
                run_tcp(state, &tcp_bind, tcp_port, max_clients),
            );
            stdio_result?;
            unix_result?;
            tcp_result?;
            Ok(())
        }
    }
}

async fn run_stdio(state: Arc<ServerState>) -> Result<(), ServerError> {
    info!("starting stdio transport");
    tokio::task::spawn_blocking(move || protocol::stdio::run(state))
        .await
        .map_err(|e| ServerError::Transport(std::io::Error::other(e.to_string())))??;
    Ok(())
}

async fn run_unix(state: Arc<ServerState>, path: &std::path::Path) -> Result<(), ServerError> {
    info!(path = %path.display(), "starting unix transport");
    protocol::unix::run(state, path).await?;
    Ok(())
}

async fn run_tcp(state: Arc<ServerState>, bind: &str, port: u16, max_clients: usize) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .map_err(|e| ServerError::Transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{e}"))))?;
    info!(%addr, "starting tcp transport");
    protocol::tcp::run(state, addr, max_clients).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            ServerError::PortInUse(addr.to_string())
        } else {
            ServerError::Transport(e)
        }
    })
}

/// Flips the shared shutdown flag on SIGTERM/SIGINT; transports poll it at
/// a 1s cadence rather than being interrupted mid-accept.
fn spawn_shutdown_listener(state: Arc<ServerState>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("shutdown signal received");
        state.request_shutdown();
    });
}
