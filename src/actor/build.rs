//! Build Actor
//!
//! Runs orchestration passes one at a time on a blocking thread and moves
//! the server through its lifecycle:
//!
//! ```text
//! Idle ──initial pass──► Serving ──request──► Rebuilding ──pass──► Serving
//! ```
//!
//! A failed pass leaves the previous output in place; the server keeps
//! serving it and browsers get an error overlay instead of a reload.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::messages::WsMsg;
use crate::core::{ServerState, StateCell};
use crate::logger::{status_error, status_success, status_unchanged};
use crate::pipeline::{BuildError, BuildOutcome, Pipeline};
use crate::reload::queue::{RebuildReceiver, RebuildRequest};

pub struct BuildActor {
    rx: RebuildReceiver,
    pipeline: Arc<Pipeline>,
    state: Arc<StateCell>,
    ws_tx: mpsc::Sender<WsMsg>,
    /// Last pass failed; the next good one clears the browser overlay.
    failed: bool,
}

impl BuildActor {
    pub fn new(
        rx: RebuildReceiver,
        pipeline: Arc<Pipeline>,
        state: Arc<StateCell>,
        ws_tx: mpsc::Sender<WsMsg>,
    ) -> Self {
        Self {
            rx,
            pipeline,
            state,
            ws_tx,
            failed: false,
        }
    }

    /// Initial pass, then one pass per request until the queue closes.
    pub async fn run(mut self) {
        self.initial_build().await;

        while let Some(request) = self.rx.recv().await {
            if self.state.get() == ServerState::Stopped {
                break;
            }
            self.rebuild(request).await;
        }

        self.rx.close();
        crate::debug!("build"; "stopped");
    }

    async fn initial_build(&mut self) {
        let started = Instant::now();
        let result = self.run_pipeline().await;

        // Serve whatever the output directory holds, even after a failure.
        if let Err(actual) = self.state.transition(ServerState::Idle, ServerState::Serving) {
            crate::debug!("build"; "initial build finished in state {:?}", actual);
        }
        self.report(result, "initial build", started.elapsed()).await;
    }

    async fn rebuild(&mut self, request: RebuildRequest) {
        if let Err(actual) = self.state.transition(ServerState::Serving, ServerState::Rebuilding) {
            crate::debug!("build"; "rebuild skipped in state {:?}", actual);
            return;
        }

        let reason = request.summary(&self.pipeline.config().root);
        let started = Instant::now();
        let result = self.run_pipeline().await;

        // Only fails when shutdown already moved the server to Stopped.
        let _ = self.state.transition(ServerState::Rebuilding, ServerState::Serving);
        self.report(result, &reason, started.elapsed()).await;
    }

    /// One pass on the blocking pool. `None` if the task panicked.
    async fn run_pipeline(&self) -> Option<Result<BuildOutcome, BuildError>> {
        let pipeline = Arc::clone(&self.pipeline);
        match tokio::task::spawn_blocking(move || pipeline.run()).await {
            Ok(result) => Some(result),
            Err(e) => {
                crate::log!("build"; "build task failed: {}", e);
                None
            }
        }
    }

    async fn report(
        &mut self,
        result: Option<Result<BuildOutcome, BuildError>>,
        reason: &str,
        elapsed: Duration,
    ) {
        match result {
            Some(Ok(outcome)) => {
                if std::mem::take(&mut self.failed) {
                    self.send(WsMsg::ClearError).await;
                }
                if outcome.is_up_to_date() {
                    status_unchanged(&format!("{reason}: output up to date"));
                    return;
                }

                let stages: Vec<_> = outcome.stages.iter().map(|s| s.name()).collect();
                status_success(&format!(
                    "{reason} ({}, {} ms)",
                    stages.join(" + "),
                    elapsed.as_millis()
                ));
                self.send(WsMsg::Reload {
                    reason: reason.to_string(),
                })
                .await;
            }
            Some(Err(e)) => {
                self.failed = true;
                let stage = e.stage();
                status_error(&format!("{stage} failed: {reason}"), &e.to_string());
                self.send(WsMsg::Error {
                    path: stage.name().to_string(),
                    error: e.to_string(),
                })
                .await;
            }
            None => self.failed = true,
        }
    }

    async fn send(&self, msg: WsMsg) {
        if self.ws_tx.send(msg).await.is_err() {
            crate::debug!("build"; "ws actor gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InputKind;
    use crate::pipeline::testing::{Project, project, snapshot};
    use crate::reload::queue::{RebuildQueue, rebuild_queue};
    use std::fs;
    use std::sync::atomic::Ordering;
    use tokio::task::JoinHandle;

    struct Running {
        queue: RebuildQueue,
        ws_rx: mpsc::Receiver<WsMsg>,
        state: Arc<StateCell>,
        handle: JoinHandle<()>,
    }

    fn start(p: &Project) -> Running {
        let (queue, rx) = rebuild_queue();
        let (ws_tx, ws_rx) = mpsc::channel(8);
        let state = StateCell::new();
        let actor = BuildActor::new(rx, Arc::clone(&p.pipeline), Arc::clone(&state), ws_tx);
        Running {
            queue,
            ws_rx,
            state,
            handle: tokio::spawn(actor.run()),
        }
    }

    async fn next(ws_rx: &mut mpsc::Receiver<WsMsg>) -> WsMsg {
        tokio::time::timeout(Duration::from_secs(10), ws_rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    fn source_change(p: &Project) -> RebuildRequest {
        RebuildRequest::new(vec![p.root().join("crate/src/lib.rs")], vec![InputKind::Source])
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_initial_build_moves_to_serving() {
        let p = project("");
        let mut running = start(&p);
        assert_eq!(running.state.get(), ServerState::Idle);

        let msg = next(&mut running.ws_rx).await;
        assert!(matches!(msg, WsMsg::Reload { .. }));
        assert_eq!(running.state.get(), ServerState::Serving);
        assert!(p.dist().join("index.html").exists());

        drop(running.queue);
        running.handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rebuild_broadcasts_reload() {
        let p = project("");
        let mut running = start(&p);
        next(&mut running.ws_rx).await;

        fs::write(p.root().join("crate/src/lib.rs"), "pub fn start() { 1; }").unwrap();
        running.queue.request(source_change(&p));

        match next(&mut running.ws_rx).await {
            WsMsg::Reload { reason } => assert_eq!(reason, "crate/src/lib.rs"),
            other => panic!("expected reload, got {other:?}"),
        }
        assert_eq!(running.state.get(), ServerState::Serving);
        assert_eq!(p.calls(), 2);

        drop(running.queue);
        running.handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_rebuild_keeps_serving_previous_output() {
        let p = project("");
        let mut running = start(&p);
        next(&mut running.ws_rx).await;
        let before = snapshot(&p.dist());

        p.compiler.fail.store(true, Ordering::SeqCst);
        fs::write(p.root().join("crate/src/lib.rs"), "pub fn start() { broken }").unwrap();
        running.queue.request(source_change(&p));

        match next(&mut running.ws_rx).await {
            WsMsg::Error { path, error } => {
                assert_eq!(path, "compile");
                assert!(error.contains("aborting"));
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(running.state.get(), ServerState::Serving);
        assert_eq!(snapshot(&p.dist()), before);

        // Fixing the source clears the overlay, then reloads.
        p.compiler.fail.store(false, Ordering::SeqCst);
        fs::write(p.root().join("crate/src/lib.rs"), "pub fn start() { 2; }").unwrap();
        running.queue.request(source_change(&p));

        assert!(matches!(next(&mut running.ws_rx).await, WsMsg::ClearError));
        assert!(matches!(next(&mut running.ws_rx).await, WsMsg::Reload { .. }));

        drop(running.queue);
        running.handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stopped_server_ignores_requests() {
        let p = project("");
        let mut running = start(&p);
        next(&mut running.ws_rx).await;

        running.state.stop();
        running.queue.request(source_change(&p));
        running.handle.await.unwrap();
        assert_eq!(p.calls(), 1);
    }
}
