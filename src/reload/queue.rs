//! Rebuild Queue
//!
//! Watch events are turned into rebuild requests. While a build runs at
//! most one further request waits; anything arriving meanwhile is merged
//! into the waiting one, so a burst of edits costs at most one extra build.

use std::{path::PathBuf, sync::Arc};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::mpsc;

use crate::graph::InputKind;

/// Changes accumulated since the last build started.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RebuildRequest {
    pub changed: Vec<PathBuf>,
    pub kinds: Vec<InputKind>,
}

impl RebuildRequest {
    pub fn new(changed: Vec<PathBuf>, kinds: Vec<InputKind>) -> Self {
        Self { changed, kinds }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Merge another request, avoiding duplicates.
    fn merge(&mut self, other: RebuildRequest) {
        let existing: FxHashSet<_> = self.changed.iter().cloned().collect();
        self.changed
            .extend(other.changed.into_iter().filter(|p| !existing.contains(p)));
        for kind in other.kinds {
            if !self.kinds.contains(&kind) {
                self.kinds.push(kind);
            }
        }
    }

    /// Short description for logs and reload reasons.
    pub fn summary(&self, root: &std::path::Path) -> String {
        let Some(first) = self.changed.first() else {
            return "no changes".to_string();
        };
        let first = first.strip_prefix(root).unwrap_or(first).display();
        match self.changed.len() {
            1 => format!("{first}"),
            n => format!("{first} (+{} more)", n - 1),
        }
    }
}

/// Result of [`RebuildQueue::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A new build will run.
    Queued,
    /// Merged into the request that is already waiting.
    Coalesced,
    /// The build side has shut down.
    Closed,
}

/// Sending half, held by the file watcher.
#[derive(Clone)]
pub struct RebuildQueue {
    pending: Arc<Mutex<RebuildRequest>>,
    tx: mpsc::Sender<()>,
}

/// Receiving half, held by the build actor.
pub struct RebuildReceiver {
    pending: Arc<Mutex<RebuildRequest>>,
    rx: mpsc::Receiver<()>,
}

/// Create a queue holding at most one waiting request.
pub fn rebuild_queue() -> (RebuildQueue, RebuildReceiver) {
    let (tx, rx) = mpsc::channel(1);
    let pending = Arc::new(Mutex::new(RebuildRequest::default()));
    (
        RebuildQueue {
            pending: Arc::clone(&pending),
            tx,
        },
        RebuildReceiver { pending, rx },
    )
}

impl RebuildQueue {
    pub fn request(&self, request: RebuildRequest) -> Enqueued {
        if self.tx.is_closed() {
            return Enqueued::Closed;
        }
        self.pending.lock().merge(request);

        match self.tx.try_send(()) {
            Ok(()) => Enqueued::Queued,
            Err(mpsc::error::TrySendError::Full(())) => Enqueued::Coalesced,
            Err(mpsc::error::TrySendError::Closed(())) => Enqueued::Closed,
        }
    }
}

impl RebuildReceiver {
    /// Wait for the next non-empty request. `None` once all senders are gone.
    pub async fn recv(&mut self) -> Option<RebuildRequest> {
        loop {
            self.rx.recv().await?;
            let request = std::mem::take(&mut *self.pending.lock());
            // A request merged between the wakeup and the take leaves an
            // empty one behind.
            if !request.is_empty() {
                return Some(request);
            }
        }
    }

    /// Non-blocking [`recv`](Self::recv).
    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<RebuildRequest> {
        self.rx.try_recv().ok()?;
        Some(std::mem::take(&mut *self.pending.lock()))
    }

    /// Stop accepting requests; queued ones are still delivered.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
