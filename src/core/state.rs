//! Process-wide shutdown state for `weft serve`.
//!
//! Ctrl+C sets `SHUTDOWN`, unblocks the HTTP server and wakes the watch loop.
//! Before a server is registered the process simply exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam::channel::Sender;
use tiny_http::Server;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Wakes the watch loop when shutdown is requested
static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(tx) = SHUTDOWN_TX.get() {
            let _ = tx.send(());
        }

        if let Some(server) = SERVER.get() {
            crate::log!("serve"; "shutting down...");
            server.unblock();
        } else {
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server and watch-loop waker for graceful shutdown.
pub fn register_server(server: Arc<Server>, shutdown_tx: Sender<()>) {
    let _ = SERVER.set(server);
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_shutdown_by_default() {
        assert!(!is_shutdown());
    }
}
