//! Embedded scripts, minified at compile time by `build.rs`.
//!
//! - [`RUNTIME_JS`]: chunk runtime prepended to every emitted chunk
//! - [`HMR_CLIENT_JS`]: live-reload client injected by `weft serve`

mod template;

pub use template::{Template, TemplateVars};

/// Chunk runtime (`self.__weft`), idempotent across chunks.
pub const RUNTIME_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/runtime.min.js"));

/// Variables for the live-reload client.
pub struct HmrVars {
    pub ws_port: u16,
}

impl TemplateVars for HmrVars {
    fn apply(&self, content: &str) -> String {
        content.replace("__WEFT_HMR_PORT__", &self.ws_port.to_string())
    }
}

/// Live-reload client with WebSocket port injection.
pub const HMR_CLIENT_JS: Template<HmrVars> =
    Template::new(include_str!(concat!(env!("OUT_DIR"), "/hmr.min.js")));

/// Render the live-reload client as an inline `<script>` tag.
pub fn hmr_script_tag(ws_port: u16) -> String {
    format!(
        "<script data-weft-hmr>{}</script>",
        HMR_CLIENT_JS.render(&HmrVars { ws_port })
    )
}
