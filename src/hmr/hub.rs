//! WebSocket hub: accepts live-reload clients and broadcasts messages.
//!
//! ```text
//! DevSession --[HotReloadMessage]--> WsHub --[broadcast]--> clients
//! ```
//!
//! An acceptor thread handshakes new clients; a reader thread polls them
//! (non-blocking) to notice closed connections and to flush frames a full
//! socket buffer held back. The last error is kept and replayed to clients
//! that connect while it is showing.

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::{HotReloadMessage, PatchSink};
use crate::core::is_shutdown;
use crate::{debug, log};

const MAX_PORT_RETRIES: u16 = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

pub struct WsHub {
    clients: Clients,
    /// `(path, error)` of the failure currently on screen
    pending_error: Mutex<Option<(String, String)>>,
    port: u16,
}

impl WsHub {
    /// Bind at `base_port` (or the next free port) and start accepting.
    pub fn start(interface: IpAddr, base_port: u16) -> Result<Arc<Self>> {
        let (listener, port) = try_bind_port(interface, base_port)?;
        listener.set_nonblocking(true)?;

        let hub = Arc::new(Self {
            clients: Arc::new(Mutex::new(Vec::new())),
            pending_error: Mutex::new(None),
            port,
        });

        let acceptor = Arc::clone(&hub);
        thread::Builder::new()
            .name("weft-hmr-accept".into())
            .spawn(move || acceptor.accept_loop(listener))?;

        let clients = Arc::clone(&hub.clients);
        thread::Builder::new()
            .name("weft-hmr-read".into())
            .spawn(move || client_reader_loop(clients))?;

        debug!("hmr"; "ws://{}:{}", interface, port);
        Ok(hub)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    #[cfg(test)]
    fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    fn accept_loop(&self, listener: TcpListener) {
        while !is_shutdown() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    debug!("hmr"; "client connected: {}", addr);
                    // Handshake in blocking mode, poll afterwards
                    let _ = stream.set_nonblocking(false);
                    self.add_client(stream);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    log!("hmr"; "accept error: {}", e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    fn add_client(&self, stream: TcpStream) {
        let mut ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                log!("hmr"; "handshake failed: {}", e);
                return;
            }
        };
        let _ = ws.get_ref().set_nonblocking(true);

        if let Err(e) = deliver(&mut ws, Message::Text(HotReloadMessage::connected().to_json().into())) {
            log!("hmr"; "failed to send connected message: {}", e);
            return;
        }
        if let Some((path, error)) = self.pending_error.lock().clone() {
            let message = HotReloadMessage::error(path, error);
            if let Err(e) = deliver(&mut ws, Message::Text(message.to_json().into())) {
                debug!("hmr"; "failed to replay pending error: {}", e);
            }
        }

        let mut clients = self.clients.lock();
        clients.push(ws);
        debug!("hmr"; "{} clients", clients.len());
    }

    fn broadcast(&self, message: Message) {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            return;
        }
        clients.retain_mut(|client| match deliver(client, message.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!("hmr"; "client dropped: {}", e);
                false
            }
        });
    }

    /// Close every connection.
    pub fn close_all(&self) {
        for mut client in self.clients.lock().drain(..) {
            let _ = client.close(None);
            let _ = client.flush();
        }
    }
}

impl PatchSink for WsHub {
    fn send(&self, message: HotReloadMessage) {
        match &message {
            HotReloadMessage::Error { path, error } => {
                *self.pending_error.lock() = Some((path.clone(), error.clone()));
            }
            HotReloadMessage::ClearError => *self.pending_error.lock() = None,
            _ => {}
        }
        self.broadcast(Message::Text(message.to_json().into()));
    }
}

/// Send on a non-blocking socket. A frame the socket cannot take yet stays
/// queued in the client's write buffer and goes out on a later flush.
fn deliver(client: &mut WebSocket<TcpStream>, message: Message) -> tungstenite::Result<()> {
    match client.send(message) {
        Err(ref e) if is_would_block(e) => Ok(()),
        result => result,
    }
}

fn is_would_block(error: &tungstenite::Error) -> bool {
    matches!(error, tungstenite::Error::Io(e) if e.kind() == std::io::ErrorKind::WouldBlock)
}

/// Flush queued frames and drop clients whose connection closed. Client
/// messages carry nothing the hub needs.
fn client_reader_loop(clients: Clients) {
    while !is_shutdown() {
        thread::sleep(POLL_INTERVAL);

        let mut clients = clients.lock();
        clients.retain_mut(|client| {
            match client.flush() {
                Err(ref e) if !is_would_block(e) => return false,
                _ => {}
            }
            match client.read() {
                Ok(Message::Close(_)) => false,
                Ok(_) => true,
                Err(ref e) => is_would_block(e),
            }
        });
    }
}

fn try_bind_port(interface: IpAddr, base_port: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual = listener.local_addr()?.port();
                if offset > 0 {
                    log!("hmr"; "port {} in use, using {} instead", base_port, actual);
                }
                return Ok((listener, actual));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "failed to bind live-reload socket after {} attempts: {}",
        MAX_PORT_RETRIES,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_client_receives_connected_then_broadcast() {
        let hub = WsHub::start(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        let url = format!("ws://127.0.0.1:{}", hub.port());
        let (mut socket, _) = tungstenite::connect(url).unwrap();

        let first = socket.read().unwrap();
        assert!(first.to_text().unwrap().contains("\"type\":\"connected\""));

        for _ in 0..50 {
            if hub.client_count() == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        hub.send(HotReloadMessage::reload("test"));
        let next = socket.read().unwrap();
        assert_eq!(next.to_text().unwrap(), r#"{"type":"reload","reason":"test"}"#);
    }

    #[test]
    fn test_pending_error_replayed_to_new_clients() {
        let hub = WsHub::start(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        hub.send(HotReloadMessage::error("src/a.js", "boom"));

        let (mut socket, _) = tungstenite::connect(format!("ws://127.0.0.1:{}", hub.port())).unwrap();
        let _connected = socket.read().unwrap();
        let replay = socket.read().unwrap();
        assert!(replay.to_text().unwrap().contains("boom"));

        hub.send(HotReloadMessage::ClearError);
        assert!(hub.pending_error.lock().is_none());
    }

    #[test]
    fn test_slow_client_keeps_large_message() {
        let hub = WsHub::start(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        let (mut socket, _) = tungstenite::connect(format!("ws://127.0.0.1:{}", hub.port())).unwrap();
        let _connected = socket.read().unwrap();
        for _ in 0..50 {
            if hub.client_count() == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        // Larger than the loopback socket buffers while the client is not reading
        let content = "a".repeat(12 * 1024 * 1024);
        hub.send(HotReloadMessage::Css {
            href: "styles.css".into(),
            content: content.clone(),
        });
        assert_eq!(hub.client_count(), 1);

        let message = socket.read().unwrap();
        assert!(message.to_text().unwrap().contains(&content));
        assert_eq!(hub.client_count(), 1);
    }
}
