//! HTTP response handlers.

use anyhow::{Context, Result, anyhow};
use std::{fs, path::Path};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::embed::hmr_script_tag;
use crate::html::inject_before;
use crate::utils::mime::{self, types};

/// Respond with an output file. HTML gets the live-reload client when a
/// hub is running.
pub fn respond_file(request: Request, path: &Path, ws_port: Option<u16>) -> Result<()> {
    let content_type = mime::from_path(path);
    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = match ws_port {
        Some(port) if mime::is_html(content_type) => inject_before(&body, b"</body>", &hmr_script_tag(port), true),
        _ => body,
    };
    send_body(request, 200, content_type, body)
}

pub fn respond_not_found(request: Request) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 404, types::PLAIN);
    }
    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &str) -> Result<()> {
    let response = Response::empty(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header {key}: {value}"))
}
