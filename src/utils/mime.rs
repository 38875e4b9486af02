//! MIME type detection for served files and inlined data URIs.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const WASM: &str = "application/wasm";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";
    pub const BMP: &str = "image/bmp";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";
    pub const EOT: &str = "application/vnd.ms-fontobject";
}

/// Guess MIME type from file extension.
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    from_extension(ext.as_deref())
}

/// Guess MIME type from file extension string (lowercase).
pub fn from_extension(ext: Option<&str>) -> &'static str {
    match ext {
        Some("html" | "htm") => types::HTML,
        Some("css") => types::CSS,
        Some("js" | "mjs" | "cjs") => types::JAVASCRIPT,
        Some("json" | "map") => types::JSON,
        Some("xml") => types::XML,
        Some("txt") => types::PLAIN,
        Some("wasm") => types::WASM,

        Some("svg") => types::SVG,
        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("avif") => types::AVIF,
        Some("ico") => types::ICO,
        Some("bmp") => types::BMP,

        Some("woff") => types::WOFF,
        Some("woff2") => types::WOFF2,
        Some("ttf") => types::TTF,
        Some("otf") => types::OTF,
        Some("eot") => types::EOT,

        _ => types::OCTET_STREAM,
    }
}

/// MIME type without parameters (`text/css; charset=utf-8` -> `text/css`).
pub fn essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

pub fn is_html(mime: &str) -> bool {
    essence(mime) == "text/html"
}
