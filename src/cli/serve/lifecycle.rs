//! Server lifecycle management.

use anyhow::{Result, anyhow};
use std::net::{IpAddr, SocketAddr};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::Server;

use crate::log;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind to the interface at `base_port`, or the next free port after it.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = String::new();
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((server, addr));
            }
            Err(err) => last_error = err.to_string(),
        }
    }
    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error
    ))
}

/// Wait for the watch loop to finish (max 2 seconds).
pub fn wait_for_shutdown(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };

    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_skips_taken_port() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let (first, addr) = bind_with_retry(localhost, 0).unwrap();
        let (_second, next) = bind_with_retry(localhost, addr.port()).unwrap();
        assert_ne!(addr.port(), next.port());
        drop(first);
    }
}
