//! Dev server lifecycle state and process-wide shutdown handling.
//!
//! ```text
//! Idle ──► Serving ──► Rebuilding ──► Serving ──► ...
//!   │         │            │
//!   └─────────┴────────────┴──► Stopped (terminal)
//! ```
//!
//! `Idle` covers the initial build: the HTTP server is already bound and
//! answers with a loading page until the first pass finishes.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_http::Server;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Idle = 0,
    Serving = 1,
    Rebuilding = 2,
    Stopped = 3,
}

impl ServerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Serving,
            2 => Self::Rebuilding,
            _ => Self::Stopped,
        }
    }

    /// Whether `self -> next` is an edge of the lifecycle.
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Serving)
                | (Self::Serving, Self::Rebuilding)
                | (Self::Rebuilding, Self::Serving)
                | (Self::Idle | Self::Serving | Self::Rebuilding, Self::Stopped)
        )
    }

    /// Whether HTTP requests are answered from the output directory.
    pub const fn serves_output(self) -> bool {
        matches!(self, Self::Serving | Self::Rebuilding)
    }
}

/// Shared, lock-free holder of the current [`ServerState`].
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self {
        Self(AtomicU8::new(ServerState::Idle as u8))
    }
}

impl StateCell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`.
    ///
    /// Fails (returning the actual state) when the current state is not
    /// `from` or the edge is not part of the lifecycle.
    pub fn transition(&self, from: ServerState, to: ServerState) -> Result<(), ServerState> {
        if !from.can_transition(to) {
            return Err(self.get());
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ServerState::from_u8)
    }

    /// Enter `Stopped` from any state.
    pub fn stop(&self) {
        self.0.store(ServerState::Stopped as u8, Ordering::Release);
    }
}

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Shutdown signal sender for actor system
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start
///
/// The handler behavior depends on whether a server has been registered:
/// - Before `register_server()`: exit immediately (one-shot builds)
/// - After `register_server()`: graceful shutdown (unblock server, notify actors)
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SERVER.get().is_some() {
            crate::log!("serve"; "shutting down...");
            request_shutdown();
        } else {
            std::process::exit(130);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server for graceful shutdown
///
/// Call this after binding the server, before entering the request loop
pub fn register_server(server: Arc<Server>, shutdown_tx: crossbeam::channel::Sender<()>) {
    let _ = SERVER.set(server);
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

/// Flag shutdown, notify the actors and unblock the request loop.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
    if let Some(tx) = SHUTDOWN_TX.get() {
        let _ = tx.send(());
    }
    if let Some(server) = SERVER.get() {
        server.unblock();
    }
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

// =============================================================================
// Tests
// =============================================================================
