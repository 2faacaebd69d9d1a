//! Actor Coordinator - wires up the dev server's actor system
//!
//! The Coordinator only creates channels, starts actors and tears them down
//! on shutdown. Build logic lives in `pipeline/`.
//!
//! ```text
//! FsActor ──RebuildQueue──► BuildActor ──WsMsg──► WsActor
//!                                                   ▲
//!                       accept loop ──AddClient─────┘
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::build::BuildActor;
use super::fs::FsActor;
use super::messages::WsMsg;
use super::ws::WsActor;
use crate::core::StateCell;
use crate::pipeline::Pipeline;
use crate::reload::queue::rebuild_queue;

/// Channel buffer size
const CHANNEL_BUFFER: usize = 32;

/// Grace period for an in-flight pass to finish its output swap.
const BUILD_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinator - wires up and runs the actor system
pub struct Coordinator {
    pipeline: Arc<Pipeline>,
    state: Arc<StateCell>,
    ws_tx: mpsc::Sender<WsMsg>,
    ws_rx: mpsc::Receiver<WsMsg>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(pipeline: Arc<Pipeline>, state: Arc<StateCell>) -> Self {
        let (ws_tx, ws_rx) = mpsc::channel(CHANNEL_BUFFER);
        Self {
            pipeline,
            state,
            ws_tx,
            ws_rx,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Bind the live-reload WebSocket listener, returning the actual port.
    pub fn start_reload_server(&self, interface: IpAddr, base_port: u16) -> Result<u16> {
        crate::reload::server::start_ws_server(interface, base_port, self.ws_tx.clone())
    }

    /// Run the initial build and, in watch mode, rebuild on changes until
    /// shutdown.
    pub async fn run(self) -> Result<()> {
        let Self {
            pipeline,
            state,
            ws_tx,
            ws_rx,
            shutdown_rx,
        } = self;
        let config = pipeline.config();
        let (queue, rebuild_rx) = rebuild_queue();

        // Watcher first, so edits made during the initial build are seen.
        let fs_actor = if config.serve.watch {
            let actor = FsActor::new(
                pipeline.graph().clone(),
                queue.clone(),
                Arc::clone(&state),
                config.serve.debounce(),
                config.root.clone(),
            )
            .map_err(|e| anyhow!("watcher failed: {}", e))?;
            Some(actor)
        } else {
            None
        };

        let build_actor = BuildActor::new(
            rebuild_rx,
            Arc::clone(&pipeline),
            Arc::clone(&state),
            ws_tx.clone(),
        );
        let ws_actor = WsActor::new(ws_rx);

        crate::debug!("actor"; "start");
        let ws_handle = tokio::spawn(ws_actor.run());
        let mut build_handle = tokio::spawn(build_actor.run());
        let fs_handle = fs_actor.map(|actor| tokio::spawn(actor.run()));

        match shutdown_rx {
            Some(rx) => loop {
                if rx.try_recv().is_ok() {
                    crate::debug!("actor"; "shutdown signal received");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            },
            None => {
                let _ = (&mut build_handle).await;
            }
        }

        state.stop();
        if let Some(handle) = fs_handle {
            handle.abort();
        }
        drop(queue);
        if tokio::time::timeout(BUILD_DRAIN_TIMEOUT, build_handle).await.is_err() {
            crate::debug!("actor"; "build still running at shutdown");
        }

        let _ = ws_tx.send(WsMsg::Shutdown).await;
        let _ = tokio::time::timeout(Duration::from_millis(500), ws_handle).await;

        crate::debug!("actor"; "stopped");
        Ok(())
    }
}
