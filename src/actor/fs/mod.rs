//! FileSystem Actor
//!
//! Watches the input directories and turns debounced changes into rebuild
//! requests.
//!
//! ```text
//! notify → Debouncer (timing, dedup) → AssetGraph::classify → RebuildQueue
//! ```
//!
//! The watcher is attached before the initial build starts, so edits made
//! while it runs are not lost.

mod debouncer;
mod watch_roots;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::RecommendedWatcher;
use tokio::sync::mpsc;

use crate::core::{ServerState, StateCell};
use crate::graph::{AssetGraph, InputKind};
use crate::log;
use crate::reload::queue::{Enqueued, RebuildQueue, RebuildRequest};
use debouncer::Debouncer;
use watch_roots::WatchRoots;

/// FileSystem Actor - watches for file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    watch_roots: WatchRoots,
    queue: RebuildQueue,
    debouncer: Debouncer,
    graph: AssetGraph,
    state: Arc<StateCell>,
    /// Project root, for display
    root: PathBuf,
}

impl FsActor {
    /// Start watching immediately; events buffer until [`run`](Self::run).
    pub fn new(
        graph: AssetGraph,
        queue: RebuildQueue,
        state: Arc<StateCell>,
        debounce: Duration,
        root: PathBuf,
    ) -> notify::Result<Self> {
        // notify has no async API
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut watch_roots = WatchRoots::new(graph.watch_roots());
        watch_roots.attach_existing(&mut watcher)?;
        crate::debug!("watch"; "watching {} root(s)", watch_roots.attached_count());

        Ok(Self {
            notify_rx,
            watcher,
            watch_roots,
            queue,
            debouncer: Debouncer::new(debounce),
            graph,
            state,
            root,
        })
    }

    /// Run the actor event loop
    pub async fn run(self) {
        let Self {
            notify_rx,
            mut watcher,
            mut watch_roots,
            queue,
            mut debouncer,
            graph,
            state,
            root,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                Some(event) = async_rx.recv() => debouncer.add_notify(&event, Instant::now()),
                _ = tokio::time::sleep(debouncer.sleep_duration(Instant::now())) => {
                    if state.get() == ServerState::Stopped {
                        break;
                    }
                    watch_roots.maintain(&mut watcher);
                    if process_changes(&mut debouncer, Instant::now(), &graph, &queue, &root).is_err() {
                        break;
                    }
                }
            }
        }
        crate::debug!("watch"; "stopped");
    }
}

/// Turn a ready batch into at most one rebuild request.
///
/// Returns `Err(())` once the build side has shut down.
fn process_changes(
    debouncer: &mut Debouncer,
    now: Instant,
    graph: &AssetGraph,
    queue: &RebuildQueue,
    root: &Path,
) -> Result<(), ()> {
    let Some(events) = debouncer.take_if_ready(now) else {
        return Ok(());
    };

    let mut changed = Vec::new();
    let mut kinds = Vec::new();
    for event in events {
        let display = event.changed_path.strip_prefix(root).unwrap_or(&event.changed_path);
        let Some(kind) = graph.classify(&event.changed_path) else {
            crate::debug!("watch"; "ignored {}: {}", event.kind.label(), display.display());
            continue;
        };
        crate::debug!("watch"; "{} {} ({})", kind.name(), event.kind.label(), display.display());
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
        changed.push(event.changed_path);
    }

    if changed.is_empty() {
        return Ok(());
    }
    if kinds.contains(&InputKind::Config) {
        log!("watch"; "config changed, restart `wasp serve` to apply new settings");
    }

    let request = RebuildRequest::new(changed, kinds);
    let summary = request.summary(root);
    match queue.request(request) {
        Enqueued::Queued => crate::debug!("watch"; "rebuild queued: {}", summary),
        Enqueued::Coalesced => crate::debug!("watch"; "merged into pending rebuild: {}", summary),
        Enqueued::Closed => return Err(()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildTarget, ChangeKind, WatchEvent};
    use crate::reload::queue::rebuild_queue;
    use std::fs;
    use tempfile::TempDir;

    const WINDOW: Duration = Duration::from_millis(300);

    fn graph() -> (TempDir, PathBuf, AssetGraph) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("public")).unwrap();
        fs::write(root.join("Cargo.toml"), "[package]").unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        fs::write(root.join("public/index.html"), "<head></head>").unwrap();

        let config = crate::config::test_config_at(root, "");
        let target = BuildTarget::from_config(&config).unwrap();
        let graph = AssetGraph::new(&config, &target);
        let root = config.root.clone();
        (dir, root, graph)
    }

    fn modified(path: PathBuf, at: Instant) -> WatchEvent {
        WatchEvent {
            changed_path: path,
            kind: ChangeKind::Modified,
            timestamp: at,
        }
    }

    #[test]
    fn test_burst_triggers_one_rebuild() {
        let (_dir, root, graph) = graph();
        let (queue, mut rx) = rebuild_queue();
        let mut debouncer = Debouncer::new(WINDOW);

        let t0 = Instant::now();
        for i in 0..10u32 {
            let path = root.join(format!("src/file{i}.rs"));
            debouncer.add(modified(path, t0 + Duration::from_millis(10) * i));
        }
        let last = t0 + Duration::from_millis(90);

        process_changes(&mut debouncer, last + Duration::from_millis(100), &graph, &queue, &root)
            .unwrap();
        assert!(rx.try_recv().is_none());

        process_changes(&mut debouncer, last + WINDOW, &graph, &queue, &root).unwrap();
        let request = rx.try_recv().unwrap();
        assert_eq!(request.changed.len(), 10);
        assert_eq!(request.kinds, vec![InputKind::Source]);
        assert!(rx.try_recv().is_none());

        // Nothing left over for the next tick.
        process_changes(&mut debouncer, last + WINDOW * 2, &graph, &queue, &root).unwrap();
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_output_changes_ignored() {
        let (_dir, root, graph) = graph();
        let (queue, mut rx) = rebuild_queue();
        let mut debouncer = Debouncer::new(WINDOW);

        let t0 = Instant::now();
        debouncer.add(modified(root.join("dist/index.html"), t0));
        debouncer.add(modified(root.join(".wasp/build.json"), t0));
        debouncer.add(modified(root.join("target/debug/app.d"), t0));

        process_changes(&mut debouncer, t0 + WINDOW, &graph, &queue, &root).unwrap();
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_template_and_source_kinds() {
        let (_dir, root, graph) = graph();
        let (queue, mut rx) = rebuild_queue();
        let mut debouncer = Debouncer::new(WINDOW);

        let t0 = Instant::now();
        debouncer.add(modified(root.join("public/index.html"), t0));
        debouncer.add(modified(root.join("src/lib.rs"), t0));

        process_changes(&mut debouncer, t0 + WINDOW, &graph, &queue, &root).unwrap();
        let request = rx.try_recv().unwrap();
        assert!(request.kinds.contains(&InputKind::Template));
        assert!(request.kinds.contains(&InputKind::Source));
    }

    #[test]
    fn test_closed_queue_stops_actor() {
        let (_dir, root, graph) = graph();
        let (queue, rx) = rebuild_queue();
        drop(rx);
        let mut debouncer = Debouncer::new(WINDOW);

        let t0 = Instant::now();
        debouncer.add(modified(root.join("src/lib.rs"), t0));
        assert!(process_changes(&mut debouncer, t0 + WINDOW, &graph, &queue, &root).is_err());
    }
}
