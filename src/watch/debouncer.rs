use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::ModifyKind;

use crate::debug;
use crate::utils::path::normalize_path;

/// What happened to a file inside one debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Coalesces raw notify events per path.
///
/// Only timing and deduplication live here; deciding what a change means
/// for the build is the dev session's job.
pub struct Debouncer {
    window: Duration,
    changes: BTreeMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            changes: BTreeMap::new(),
            last_event: None,
        }
    }

    /// Record a notify event.
    ///
    /// - removed, then created/modified: the file is back, keep the new kind
    /// - modified, then removed: removed
    /// - created, then removed: nothing happened
    /// - anything else: the first kind wins
    pub fn add_event(&mut self, event: &notify::Event) {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            // mtime/chmod noise would loop rebuilds
            EventKind::Modify(ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            let path = normalize_path(path);
            self.last_event = Some(Instant::now());

            let Some(&existing) = self.changes.get(&path) else {
                debug!("watch"; "{}: {}", kind.label(), path.display());
                self.changes.insert(path, kind);
                continue;
            };

            match (existing, kind) {
                (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                    self.changes.insert(path, kind);
                }
                (ChangeKind::Modified, ChangeKind::Removed) => {
                    self.changes.insert(path, ChangeKind::Removed);
                }
                (ChangeKind::Created, ChangeKind::Removed) => {
                    debug!("watch"; "discard created+removed: {}", path.display());
                    self.changes.remove(&path);
                }
                _ => {}
            }
        }
    }

    /// Take the coalesced batch once the window has been quiet.
    pub fn take_if_ready(&mut self) -> Option<Vec<(PathBuf, ChangeKind)>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;

        let batch: Vec<_> = std::mem::take(&mut self.changes)
            .into_iter()
            .filter(|(path, _)| !path.is_dir())
            .collect();
        (!batch.is_empty()).then_some(batch)
    }

    pub fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|last| last.elapsed() >= self.window && !self.changes.is_empty())
    }

    /// Time until the pending batch could be ready.
    pub fn sleep_duration(&self) -> Duration {
        match self.last_event {
            Some(last) => self
                .window
                .saturating_sub(last.elapsed())
                .max(Duration::from_millis(1)),
            None => Duration::from_secs(1),
        }
    }
}

/// Editor artifacts and hidden files.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || name.ends_with(".weft-tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    fn modified(path: &str) -> notify::Event {
        event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), path)
    }

    #[test]
    fn test_latest_event_per_path() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.add_event(&modified("/p/src/a.js"));
        debouncer.add_event(&modified("/p/src/a.js"));
        debouncer.add_event(&modified("/p/src/b.js"));

        let batch = debouncer.take_if_ready().unwrap();
        assert_eq!(
            batch,
            [
                (PathBuf::from("/p/src/a.js"), ChangeKind::Modified),
                (PathBuf::from("/p/src/b.js"), ChangeKind::Modified),
            ]
        );
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn test_created_then_removed_cancels() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.add_event(&event(EventKind::Create(CreateKind::File), "/p/src/new.js"));
        debouncer.add_event(&event(EventKind::Remove(RemoveKind::File), "/p/src/new.js"));
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn test_modified_then_removed_is_removed() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.add_event(&modified("/p/src/a.js"));
        debouncer.add_event(&event(EventKind::Remove(RemoveKind::File), "/p/src/a.js"));
        let batch = debouncer.take_if_ready().unwrap();
        assert_eq!(batch[0].1, ChangeKind::Removed);
    }

    #[test]
    fn test_metadata_and_temp_files_ignored() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.add_event(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            "/p/src/a.js",
        ));
        debouncer.add_event(&modified("/p/src/.a.js.swp"));
        debouncer.add_event(&modified("/p/src/a.js~"));
        assert!(!debouncer.is_ready());
    }

    #[test]
    fn test_window_holds_batch() {
        let mut debouncer = Debouncer::new(Duration::from_secs(60));
        debouncer.add_event(&modified("/p/src/a.js"));
        assert!(debouncer.take_if_ready().is_none());
        assert!(debouncer.sleep_duration() > Duration::from_secs(1));
    }
}
