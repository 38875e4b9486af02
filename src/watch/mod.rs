//! File watching for `weft serve`.
//!
//! ```text
//! notify --> channel --> Debouncer --> batch --> DevSession::rebuild
//! ```
//!
//! The watcher is created before the first build so edits made while it
//! runs are buffered, not lost. Batches are pulled synchronously: while a
//! rebuild runs, new events queue in the channel and form the next batch.

mod debouncer;

pub use debouncer::{ChangeKind, Debouncer};

use std::path::PathBuf;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::core::is_shutdown;
use crate::log;

pub struct FileWatcher {
    events: Receiver<notify::Result<notify::Event>>,
    /// Kept alive for as long as events are wanted
    _watcher: RecommendedWatcher,
    debouncer: Debouncer,
}

impl FileWatcher {
    /// Start watching `roots` recursively. Missing roots are skipped.
    pub fn new(roots: &[PathBuf], window: Duration) -> notify::Result<Self> {
        let (tx, events) = channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        for root in roots {
            if root.exists() {
                watcher.watch(root, RecursiveMode::Recursive)?;
            } else {
                log!("watch"; "skipping missing {}", root.display());
            }
        }

        Ok(Self {
            events,
            _watcher: watcher,
            debouncer: Debouncer::new(window),
        })
    }

    /// Block until a debounced batch is ready. `None` once shutdown was
    /// requested or the watcher died.
    pub fn next_batch(&mut self, shutdown: &Receiver<()>) -> Option<Vec<(PathBuf, ChangeKind)>> {
        loop {
            if is_shutdown() {
                return None;
            }
            if let Some(batch) = self.debouncer.take_if_ready() {
                return Some(batch);
            }

            let wait = self.debouncer.sleep_duration();
            channel::select! {
                recv(self.events) -> message => match message {
                    Ok(Ok(event)) => self.debouncer.add_event(&event),
                    Ok(Err(err)) => log!("watch"; "notify error: {}", err),
                    Err(_) => return None,
                },
                recv(shutdown) -> _ => return None,
                default(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = TempDir::new().unwrap();
        let roots = [dir.path().to_path_buf(), dir.path().join("absent")];
        assert!(FileWatcher::new(&roots, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_shutdown_signal_ends_wait() {
        let dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(&[dir.path().to_path_buf()], Duration::from_millis(10)).unwrap();
        let (tx, rx) = channel::bounded(1);
        tx.send(()).unwrap();
        assert!(watcher.next_batch(&rx).is_none());
    }

    #[test]
    fn test_write_produces_batch() {
        let dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(&[dir.path().to_path_buf()], Duration::from_millis(20)).unwrap();
        fs::write(dir.path().join("a.js"), "1").unwrap();

        let (_tx, rx) = channel::bounded::<()>(1);
        let batch = watcher.next_batch(&rx).unwrap();
        assert!(batch.iter().any(|(path, _)| path.ends_with("a.js")));
    }
}
