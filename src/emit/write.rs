//! Write phase: rendered bytes onto disk.
//!
//! Files are written through a temporary sibling and renamed into place.
//! The manifest is written last, and only after every file landed within
//! the deadline, so a failure part-way leaves the previous manifest (or
//! none) published. A timed-out worker stops at the next file and is joined
//! before `execute` returns.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::core::EmissionError;
use crate::debug;
use crate::utils::timeout::{Deadline, run_cancellable};

const ATTEMPTS: u32 = 3;
const BACKOFF: Duration = Duration::from_millis(25);

/// Everything one commit touches.
#[derive(Debug, Default)]
pub struct WritePlan {
    pub output_dir: PathBuf,
    /// Remove the whole output directory first
    pub reset: bool,
    /// `(relative path, bytes)`
    pub files: Vec<(String, Arc<[u8]>)>,
    /// Relative paths no longer produced
    pub remove: Vec<String>,
    /// `(relative path, json)`, written after every file
    pub manifest: Option<(String, String)>,
}

impl WritePlan {
    /// Write files on a worker thread bounded by `timeout`, then the
    /// manifest.
    pub fn execute(mut self, timeout: Duration) -> Result<(), EmissionError> {
        let manifest = self.manifest.take();
        let output_dir = self.output_dir.clone();

        match run_cancellable(timeout, move |cancel| self.apply(cancel)) {
            Ok(result) => result?,
            Err(Deadline::Elapsed(after)) => return Err(EmissionError::Timeout(after)),
            Err(Deadline::Panicked) => return Err(EmissionError::Crashed),
        }

        if let Some((relative, json)) = manifest {
            let path = output_dir.join(relative);
            with_retry(|| write_atomic(&path, json.as_bytes())).map_err(|source| EmissionError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Returns early, leaving the rest unwritten, once `cancel` is raised.
    fn apply(&self, cancel: &AtomicBool) -> Result<(), EmissionError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| EmissionError::Io { path, source }
        };
        let cancelled = || cancel.load(Ordering::SeqCst);

        if self.reset && self.output_dir.exists() {
            fs::remove_dir_all(&self.output_dir).map_err(io_err(&self.output_dir))?;
        }
        fs::create_dir_all(&self.output_dir).map_err(io_err(&self.output_dir))?;

        for relative in &self.remove {
            if cancelled() {
                return Ok(());
            }
            let path = self.output_dir.join(relative);
            match fs::remove_file(&path) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => {
                    return Err(io_err(&path)(err));
                }
                _ => debug!("emit"; "removed {relative}"),
            }
        }

        for (relative, bytes) in &self.files {
            if cancelled() {
                debug!("emit"; "write phase cancelled before {relative}");
                return Ok(());
            }
            let path = self.output_dir.join(relative);
            with_retry(|| write_atomic(&path, bytes)).map_err(io_err(&path))?;
        }
        Ok(())
    }
}

fn with_retry(mut op: impl FnMut() -> io::Result<()>) -> io::Result<()> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(()) => return Ok(()),
            Err(err) if attempt < ATTEMPTS => {
                debug!("emit"; "write failed ({err}), retry {attempt}/{}", ATTEMPTS - 1);
                thread::sleep(BACKOFF * attempt);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.weft-tmp"));
    fs::write(&temp, bytes)?;
    fs::rename(&temp, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp);
    })
}
