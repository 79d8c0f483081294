//! Development server over the output directory.
//!
//! Built on `tiny_http`:
//!
//! - static files from the output tree
//! - `index.html` for directories, `<path>.html` for flattened pages
//! - `.gz` siblings served with `Content-Encoding: gzip` when the plain file
//!   is absent (`gziponly` pages)
//! - `404/index.html` or `404.html` as the not-found page
//! - graceful shutdown on Ctrl+C

use crate::{config::ServeOptions, log};
use anyhow::{Context, Result};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Body of the 404 response when the site has no not-found page.
const NOT_FOUND_TEXT: &str = "Error 404: Page Not Found!";

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve `root` until Ctrl+C.
pub fn serve(root: &Path, options: &ServeOptions) -> Result<()> {
    let interface: IpAddr = options
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", options.interface))?;
    let addr = SocketAddr::new(interface, options.port);

    let server = Server::http(addr)
        .map_err(|err| anyhow::anyhow!("Cannot Listen On Port {}: {err}", options.port))?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{addr}");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

// ============================================================================
// Request Handling
// ============================================================================

/// A file chosen to answer a request.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    path: PathBuf,
    /// `path` is the `.gz` sibling of the requested file.
    gzip: bool,
}

fn handle_request(request: Request, root: &Path) -> Result<()> {
    let url = urlencoding::decode(request.url())
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    let url = url.split(['?', '#']).next().unwrap_or_default();

    match resolve(root, url) {
        Some(target) => serve_file(request, &target, StatusCode(200)),
        None => match not_found_page(root) {
            Some(target) => serve_file(request, &target, StatusCode(404)),
            None => serve_not_found(request),
        },
    }
}

/// Map a decoded URL path to a file under `root`.
///
/// Tries the path itself, then `index.html` inside it, then `<path>.html`.
fn resolve(root: &Path, url: &str) -> Option<Target> {
    let mut local = root.to_path_buf();
    for component in Path::new(url.trim_start_matches('/')).components() {
        if let Component::Normal(segment) = component {
            local.push(segment);
        }
    }

    let mut candidates = vec![local.join("index.html")];
    if local != root {
        candidates.insert(0, local.clone());
        if local.extension().is_none() {
            let mut flattened = local.into_os_string();
            flattened.push(".html");
            candidates.push(PathBuf::from(flattened));
        }
    }

    candidates.into_iter().find_map(find_file)
}

/// The site's own not-found page, if it has one.
fn not_found_page(root: &Path) -> Option<Target> {
    [root.join("404").join("index.html"), root.join("404.html")]
        .into_iter()
        .find_map(find_file)
}

/// `path` itself, or its `.gz` sibling.
fn find_file(path: PathBuf) -> Option<Target> {
    if path.is_file() {
        return Some(Target { path, gzip: false });
    }
    let gz = crate::compiler::output::gzip_path(&path);
    gz.is_file().then_some(Target { path: gz, gzip: true })
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow::anyhow!("Invalid header {name}: {value}"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, target: &Target, status: StatusCode) -> Result<()> {
    let content = fs::read(&target.path)
        .with_context(|| format!("Failed to read {}", target.path.display()))?;

    let typed_path = if target.gzip {
        target.path.with_extension("")
    } else {
        target.path.clone()
    };
    let mut response = Response::from_data(content)
        .with_status_code(status)
        .with_header(header("Content-Type", guess_content_type(&typed_path))?);
    if target.gzip {
        response = response.with_header(header("Content-Encoding", "gzip")?);
    }

    request.respond(response)?;
    Ok(())
}

/// Serve the plain text 404 response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![header("Content-Type", "text/plain; charset=utf-8")?],
        Cursor::new(NOT_FOUND_TEXT),
        Some(NOT_FOUND_TEXT.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("wasm") => "application/wasm",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}
