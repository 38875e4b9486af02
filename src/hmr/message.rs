//! Live-reload message protocol.
//!
//! JSON over WebSocket, tagged by `type`:
//!
//! - `connected`: handshake done
//! - `update`: replace one module factory and re-run its importers
//! - `css`: replace an extracted stylesheet in place
//! - `reload`: full page reload
//! - `error` / `clear_error`: build error overlay

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HotReloadMessage {
    Connected {
        version: String,
    },

    Update {
        #[serde(rename = "moduleId")]
        module_id: String,
        /// A complete `__weft.define(...)` statement
        code: String,
        #[serde(rename = "sourceMap", skip_serializing_if = "Option::is_none")]
        source_map: Option<String>,
    },

    Css {
        /// Output-relative stylesheet path, as linked from the document
        href: String,
        content: String,
    },

    Reload {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Error {
        path: String,
        error: String,
    },

    ClearError,
}

impl HotReloadMessage {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn reload(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn error(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            path: path.into(),
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}
