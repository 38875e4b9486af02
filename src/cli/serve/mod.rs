//! Development server with live reload support.
//!
//! ```text
//!            ┌──────────────┐  rebuild   ┌────────────┐  patches  ┌───────┐
//!  notify ──►│ FileWatcher  │──────────►│ DevSession │─────────►│ WsHub │──► browsers
//!            └──────────────┘            └─────┬──────┘           └───────┘
//!                                              │ commit
//!                                              ▼
//!                           tiny_http ◄── output directory
//! ```
//!
//! Requests are served from disk. A request for a manifest name (say
//! `/main.js` in production) is answered with the file it maps to.

mod lifecycle;
mod path;
mod response;

use anyhow::Result;
use crossbeam::channel::{self, Receiver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Request, Server};

use crate::cli::build::plural;
use crate::config::BundleConfig;
use crate::core::{BuildMode, BuildSession, is_shutdown, register_server};
use crate::emit::ManifestStore;
use crate::hmr::{NullSink, PatchSink, WsHub};
use crate::logger::{status_error, status_success, status_unchanged};
use crate::pipeline::{DevSession, RebuildOutcome};
use crate::watch::FileWatcher;
use crate::{debug, log};

/// Number of threads answering HTTP requests.
const REQUEST_THREADS: usize = 4;

pub fn serve_project(config: &BundleConfig, mode: BuildMode) -> Result<()> {
    let session = BuildSession::new(config, mode)?;
    let serve = &config.serve;

    let (server, addr) = lifecycle::bind_with_retry(serve.interface, serve.port)?;
    let server = Arc::new(server);
    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    let hub = if serve.watch {
        Some(WsHub::start(serve.interface, serve.hmr_port)?)
    } else {
        None
    };
    let ws_port = hub.as_ref().map(|hub| hub.port());
    let sink: Arc<dyn PatchSink> = match &hub {
        Some(hub) => Arc::clone(hub) as Arc<dyn PatchSink>,
        None => Arc::new(NullSink),
    };

    // Watch before the first build so edits made during it are not lost
    let watcher = if serve.watch {
        let window = Duration::from_millis(serve.debounce_ms);
        Some(FileWatcher::new(&watch_roots(config), window)?)
    } else {
        None
    };

    let output_dir = session.output_dir.clone();
    let mut dev = DevSession::new(session, sink);
    report(dev.initial_build());
    let manifests = dev.manifests();

    log!("serve"; "http://{} ({} mode)", addr, mode);
    if let Some(port) = ws_port {
        debug!("hmr"; "ws://{}:{}", serve.interface, port);
    }

    let watch_handle = watcher.map(|watcher| thread::spawn(move || watch_loop(dev, watcher, shutdown_rx)));

    run_request_loop(&server, &output_dir, &manifests, ws_port)?;

    if let Some(hub) = &hub {
        hub.close_all();
    }
    lifecycle::wait_for_shutdown(watch_handle);
    Ok(())
}

/// Source root, plus the entry document's directory when it lives
/// elsewhere.
fn watch_roots(config: &BundleConfig) -> Vec<PathBuf> {
    let mut roots = vec![config.build.context.clone()];
    if let Some(html) = &config.html
        && let Some(dir) = html.template.parent()
        && !dir.starts_with(&config.build.context)
    {
        roots.push(dir.to_path_buf());
    }
    roots
}

fn watch_loop(mut dev: DevSession, mut watcher: FileWatcher, shutdown: Receiver<()>) {
    while let Some(batch) = watcher.next_batch(&shutdown) {
        for (path, kind) in &batch {
            debug!("watch"; "{} {}", kind.label(), path.display());
        }
        let paths: Vec<PathBuf> = batch.into_iter().map(|(path, _)| path).collect();
        report(dev.rebuild(&paths));
    }
}

fn report(outcome: RebuildOutcome) {
    match outcome {
        RebuildOutcome::Applied {
            transformed,
            written,
            patches,
            recovered,
            elapsed,
        } => {
            debug!("hmr"; "sent {} {}", patches, plural(patches, "patch", "patches"));
            match recovered.first() {
                Some(err) => status_error(&format!("kept previous {}", err.subject()), &err.to_string()),
                None => status_success(&format!(
                    "rebuilt {} {}, wrote {} {} in {:.0?}",
                    transformed,
                    plural(transformed, "module", "modules"),
                    written.len(),
                    plural(written.len(), "file", "files"),
                    elapsed
                )),
            }
        }
        RebuildOutcome::Unchanged => status_unchanged("no tracked file changed"),
        RebuildOutcome::Failed(errors) => {
            let detail: Vec<String> = errors.iter().map(ToString::to_string).collect();
            let summary = match errors.first() {
                Some(err) => format!("failed: {}", err.subject()),
                None => "failed".to_string(),
            };
            status_error(&summary, &detail.join("\n"));
        }
    }
}

fn run_request_loop(
    server: &Server,
    output_dir: &Path,
    manifests: &Arc<ManifestStore>,
    ws_port: Option<u16>,
) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("weft-http-{i}"))
        .build()?;

    for request in server.incoming_requests() {
        let output_dir = output_dir.to_path_buf();
        let manifests = Arc::clone(manifests);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &output_dir, &manifests, ws_port) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request(
    request: Request,
    output_dir: &Path,
    manifests: &ManifestStore,
    ws_port: Option<u16>,
) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    if let Some(file) = path::resolve_path(request.url(), output_dir) {
        return response::respond_file(request, &file, ws_port);
    }

    let logical = path::normalize_url(request.url());
    let physical = manifests
        .load()
        .get(&logical)
        .and_then(|physical| path::resolve_path(physical, output_dir));
    match physical {
        Some(file) => response::respond_file(request, &file, ws_port),
        None => response::respond_not_found(request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_project_config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_watch_roots_include_outside_template_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("public/index.html"), "<html></html>").unwrap();
        let config = test_project_config(
            dir.path(),
            "[[entry]]\nname = \"main\"\nimport = \"./index.js\"\n[html]\ntemplate = \"../public/index.html\"",
        );

        let roots = watch_roots(&config);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0], config.build.context);
        assert!(roots[1].ends_with("public"));
    }
}
