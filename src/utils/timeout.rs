//! Deadline enforcement for blocking work.
//!
//! The work runs on its own thread; the caller waits on a channel with
//! `recv_timeout`. With [`run_with_timeout`] an expired worker is detached
//! and its result dropped; [`run_cancellable`] instead raises a flag the
//! worker polls and joins it, so nothing it does outlives the call.

use crossbeam::channel::{self, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Deadline {
    #[error("timed out after {0:?}")]
    Elapsed(Duration),
    #[error("worker thread panicked")]
    Panicked,
}

/// Run `work` on a fresh thread, giving up after `timeout`.
pub fn run_with_timeout<T, F>(timeout: Duration, work: F) -> Result<T, Deadline>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = channel::bounded(1);
    let spawned = thread::Builder::new()
        .name("weft-deadline".into())
        .spawn(move || {
            let _ = tx.send(work());
        });
    if spawned.is_err() {
        return Err(Deadline::Panicked);
    }

    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => Err(Deadline::Elapsed(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(Deadline::Panicked),
    }
}

/// Run `work` on a fresh thread, cancelling it after `timeout`.
///
/// `work` must check the flag between steps and return early once it is
/// set. On expiry the flag is raised and the worker joined before
/// returning [`Deadline::Elapsed`].
pub fn run_cancellable<T, F>(timeout: Duration, work: F) -> Result<T, Deadline>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool) -> T + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let (tx, rx) = channel::bounded(1);
    let handle = thread::Builder::new()
        .name("weft-deadline".into())
        .spawn(move || {
            let _ = tx.send(work(&flag));
        })
        .map_err(|_| Deadline::Panicked)?;

    let outcome = match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::SeqCst);
            Err(Deadline::Elapsed(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(Deadline::Panicked),
    };
    let _ = handle.join();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completes_within_deadline() {
        let result = run_with_timeout(Duration::from_secs(5), || 40 + 2);
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn test_expires() {
        let result = run_with_timeout(Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
        });
        assert_eq!(result, Err(Deadline::Elapsed(Duration::from_millis(20))));
    }

    #[test]
    fn test_panic_is_reported() {
        let result: Result<(), _> = run_with_timeout(Duration::from_secs(5), || panic!("boom"));
        assert_eq!(result, Err(Deadline::Panicked));
    }

    #[test]
    fn test_cancelled_worker_stops_before_return() {
        let steps = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&steps);
        let result = run_cancellable(Duration::from_millis(20), move |cancel| {
            while !cancel.load(Ordering::SeqCst) {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            }
        });
        assert_eq!(result, Err(Deadline::Elapsed(Duration::from_millis(20))));

        let at_return = steps.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(steps.load(Ordering::SeqCst), at_return);
    }

    #[test]
    fn test_cancellable_completes() {
        let result = run_cancellable(Duration::from_secs(5), |cancel| cancel.load(Ordering::SeqCst));
        assert_eq!(result, Ok(false));
    }
}
