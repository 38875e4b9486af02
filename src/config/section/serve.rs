//! `[serve]` section configuration.
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 9000                 # HTTP port number
//! hmr_port = 35729            # WebSocket port for patches
//! watch = true                # Rebuild on file changes
//! debounce_ms = 100           # Quiet period before a rebuild starts
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from LAN.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeSection {
    pub interface: IpAddr,
    pub port: u16,
    pub hmr_port: u16,
    pub watch: bool,
    pub debounce_ms: u64,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 9000,
            hmr_port: 35729,
            watch: true,
            debounce_ms: 100,
        }
    }
}

impl ServeSection {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.port == self.hmr_port {
            diag.error(
                FieldPath::new("serve.hmr_port"),
                "HTTP and WebSocket ports must differ",
            );
        }
    }
}
