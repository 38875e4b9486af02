//! Patch delivery to development clients.
//!
//! The dev session produces [`HotReloadMessage`]s and hands them to a
//! [`PatchSink`]. [`WsHub`] is the WebSocket implementation used by
//! `weft serve`; tests record messages instead.

mod hub;
mod message;

pub use hub::WsHub;
pub use message::HotReloadMessage;

/// Receiver of live-reload messages.
pub trait PatchSink: Send + Sync {
    fn send(&self, message: HotReloadMessage);
}

/// Sink for sessions without clients (`weft build`, `--watch=false`).
pub struct NullSink;

impl PatchSink for NullSink {
    fn send(&self, _message: HotReloadMessage) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Keeps every message for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingSink(pub Mutex<Vec<HotReloadMessage>>);

    impl RecordingSink {
        pub(crate) fn take(&self) -> Vec<HotReloadMessage> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    impl PatchSink for RecordingSink {
        fn send(&self, message: HotReloadMessage) {
            self.0.lock().push(message);
        }
    }
}
