//! `[define]`, `[env]` and `[provide]` sections.
//!
//! ```toml
//! [define]
//! VERSION = "\"1.2.0\""       # Replacement is JavaScript source text
//!
//! [env]
//! vars = ["API_URL"]          # Captured as process.env.API_URL at load time
//!
//! [provide]
//! _ = "lodash"                # Free identifier → module auto-import
//! ```
//!
//! `process.env.NODE_ENV` is always defined from the build mode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSection {
    pub vars: Vec<String>,
}

impl EnvSection {
    /// Current values of the listed variables as `process.env.X` defines.
    ///
    /// Unset variables become `undefined`.
    pub fn capture(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .filter(|name| name.as_str() != "NODE_ENV")
            .map(|name| {
                let value = std::env::var(name)
                    .ok()
                    .and_then(|v| serde_json::to_string(&v).ok())
                    .unwrap_or_else(|| "undefined".to_string());
                (format!("process.env.{name}"), value)
            })
            .collect()
    }
}
