use std::path::PathBuf;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::core::{ChangeKind, WatchEvent};
use crate::utils::path::{is_temp_file, normalize_path};

/// Sleep used while no change is pending.
const IDLE_SLEEP: Duration = Duration::from_secs(86400);

/// Pure debouncer: only handles timing and event deduplication.
///
/// All methods take the current time explicitly so bursts can be replayed
/// deterministically.
pub(super) struct Debouncer {
    window: Duration,
    /// Path → latest event (dedup is free via HashMap key uniqueness)
    changes: FxHashMap<PathBuf, WatchEvent>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            changes: FxHashMap::default(),
            last_event: None,
        }
    }

    /// Record a notify event received at `now`.
    pub(super) fn add_notify(&mut self, event: &notify::Event, now: Instant) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // Metadata-only changes (mtime/atime/chmod) would loop
                // rebuilds that touch their own inputs.
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.add(WatchEvent {
                changed_path: normalize_path(path),
                kind,
                timestamp: now,
            });
        }
    }

    /// Add one event, applying dedup rules:
    /// - Removed + Created/Modified → the restore event
    /// - Modified + Removed → Removed
    /// - Created + Removed → nothing happened
    /// - otherwise the first event wins
    pub(super) fn add(&mut self, event: WatchEvent) {
        let timestamp = event.timestamp;
        let path = event.changed_path.clone();

        match self.changes.get(&path).map(|existing| existing.kind) {
            None => {
                crate::debug!("watch"; "event {}: {}", event.kind.label(), path.display());
                self.changes.insert(path, event);
            }
            Some(ChangeKind::Removed) if event.kind != ChangeKind::Removed => {
                crate::debug!("watch"; "restore removed->{}: {}", event.kind.label(), path.display());
                self.changes.insert(path, event);
            }
            Some(ChangeKind::Modified) if event.kind == ChangeKind::Removed => {
                crate::debug!("watch"; "upgrade modified->removed: {}", path.display());
                self.changes.insert(path, event);
            }
            Some(ChangeKind::Created) if event.kind == ChangeKind::Removed => {
                crate::debug!("watch"; "discard created+removed: {}", path.display());
                self.changes.remove(&path);
            }
            Some(_) => {}
        }

        // Every event extends the quiet period, even a deduplicated one.
        self.last_event = Some(self.last_event.map_or(timestamp, |last| last.max(timestamp)));
    }

    /// Take the batch once the window has passed without new events.
    ///
    /// Events come back sorted by path.
    pub(super) fn take_if_ready(&mut self, now: Instant) -> Option<Vec<WatchEvent>> {
        if !self.is_ready(now) {
            return None;
        }

        self.last_event = None;
        let mut events: Vec<WatchEvent> =
            std::mem::take(&mut self.changes).into_values().collect();
        if events.is_empty() {
            return None;
        }
        events.sort_by(|a, b| a.changed_path.cmp(&b.changed_path));
        Some(events)
    }

    fn is_ready(&self, now: Instant) -> bool {
        self.last_event
            .is_some_and(|last| now.saturating_duration_since(last) >= self.window)
    }

    /// Precise sleep duration until the batch can be taken.
    pub(super) fn sleep_duration(&self, now: Instant) -> Duration {
        let Some(last_event) = self.last_event else {
            return IDLE_SLEEP;
        };

        self.window
            .saturating_sub(now.saturating_duration_since(last_event))
            .max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    fn event(path: &str, kind: ChangeKind, at: Instant) -> WatchEvent {
        WatchEvent {
            changed_path: PathBuf::from(path),
            kind,
            timestamp: at,
        }
    }

    #[test]
    fn test_not_ready_within_window() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.add(event("/p/src/lib.rs", ChangeKind::Modified, t0));

        assert!(debouncer.take_if_ready(t0 + Duration::from_millis(299)).is_none());
        let batch = debouncer.take_if_ready(t0 + WINDOW).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(debouncer.take_if_ready(t0 + WINDOW * 2).is_none());
    }

    #[test]
    fn test_window_restarts_on_each_event() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        for i in 0..10u32 {
            debouncer.add(event(
                "/p/src/lib.rs",
                ChangeKind::Modified,
                t0 + Duration::from_millis(100) * i,
            ));
        }
        let last = t0 + Duration::from_millis(900);

        assert!(debouncer.take_if_ready(t0 + WINDOW).is_none());
        assert_eq!(
            debouncer.sleep_duration(last + Duration::from_millis(100)),
            Duration::from_millis(200)
        );
        assert_eq!(debouncer.take_if_ready(last + WINDOW).unwrap().len(), 1);
    }

    #[test]
    fn test_created_then_removed_discarded() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.add(event("/p/src/a.rs", ChangeKind::Created, t0));
        debouncer.add(event("/p/src/a.rs", ChangeKind::Removed, t0));
        assert!(debouncer.take_if_ready(t0 + WINDOW).is_none());
    }

    #[test]
    fn test_modified_then_removed_upgrades() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.add(event("/p/src/a.rs", ChangeKind::Modified, t0));
        debouncer.add(event("/p/src/a.rs", ChangeKind::Removed, t0));
        let batch = debouncer.take_if_ready(t0 + WINDOW).unwrap();
        assert_eq!(batch[0].kind, ChangeKind::Removed);
    }

    #[test]
    fn test_removed_then_created_restores() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.add(event("/p/src/a.rs", ChangeKind::Removed, t0));
        debouncer.add(event("/p/src/a.rs", ChangeKind::Created, t0));
        let batch = debouncer.take_if_ready(t0 + WINDOW).unwrap();
        assert_eq!(batch[0].kind, ChangeKind::Created);
    }

    #[test]
    fn test_metadata_only_ignored() {
        use notify::event::{EventKind, MetadataKind, ModifyKind};

        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        let notify_event = notify::Event::new(EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::WriteTime,
        )))
        .add_path(PathBuf::from("/p/src/lib.rs"));
        debouncer.add_notify(&notify_event, t0);

        assert_eq!(debouncer.sleep_duration(t0), IDLE_SLEEP);
    }

    #[test]
    fn test_temp_files_ignored() {
        use notify::event::{CreateKind, EventKind};

        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        let notify_event = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/p/src/.lib.rs.swp"));
        debouncer.add_notify(&notify_event, t0);
        assert!(debouncer.take_if_ready(t0 + WINDOW).is_none());
    }
}
