//! Shared server state and the background consolidation scheduler.
//!
//! A spawned loop periodically calls `consolidation_run` for every known
//! owner. The engine lock here is `std::sync::Mutex`, not an async mutex:
//! the engine is fully synchronous, so transports invoke it through
//! `spawn_blocking` instead of holding an async lock across `.await`
//! points.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use katra_core::engine::Engine;
use tracing::{info, warn};

use crate::dispatch::{self, HandlerFn};

/// Shared across every connection and the background scheduler.
pub struct ServerState {
    pub engine: Mutex<Engine>,
    pub registry: HashMap<&'static str, HandlerFn>,
    pub shutdown: AtomicBool,
}

impl ServerState {
    pub fn new(engine: Engine) -> Arc<Self> {
        Arc::new(Self {
            engine: Mutex::new(engine),
            registry: dispatch::registry(),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Spawns the periodic consolidation loop, one pass every
/// `interval_hours`, one `consolidation_run` per owner known to the mailbox.
/// A run that errors is logged and skipped; it never kills the loop.
pub fn spawn_consolidation_scheduler(state: Arc<ServerState>, interval_hours: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_hours.max(1) * 3600);
        loop {
            tokio::time::sleep(interval).await;
            if state.is_shutting_down() {
                break;
            }
            let state = state.clone();
            let result = tokio::task::spawn_blocking(move || run_consolidation_pass(&state)).await;
            match result {
                Ok(Ok(count)) => info!(owners = count, "consolidation pass complete"),
                Ok(Err(e)) => warn!(error = %e, "consolidation pass failed"),
                Err(e) => warn!(error = %e, "consolidation task panicked"),
            }
        }
    });
}

fn run_consolidation_pass(state: &ServerState) -> katra_core::error::Result<usize> {
    let engine = state.engine.lock().map_err(|_| {
        katra_core::error::EngineError::Internal("engine lock poisoned".into())
    })?;
    let owners = engine.who_is_here()?;
    for owner_id in &owners {
        engine.consolidation_run(owner_id, false)?;
    }
    Ok(owners.len())
}
