//! HTTP response handlers.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::ServeContext;
use super::compress::{accepts_gzip, gzip, should_compress};
use super::content::maybe_inject_hotreload;
use crate::utils::mime::types::{HTML, JAVASCRIPT, PLAIN};

/// Respond with a file from the output directory.
pub fn respond_file(request: Request, path: &Path, ctx: &ServeContext) -> Result<()> {
    let content_type = crate::utils::mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = maybe_inject_hotreload(body, content_type, ctx.ws_port);
    send_body(request, 200, content_type, body, ctx)
}

/// Respond with 404 page (custom `404.html` or plain text).
pub fn respond_not_found(request: Request, ctx: &ServeContext) -> Result<()> {
    let custom_404 = ctx.output_dir.join("404.html");
    let has_custom = custom_404.is_file();

    if is_head_request(&request) {
        return send_head(request, 404, if has_custom { HTML } else { PLAIN });
    }

    if has_custom && let Ok(body) = fs::read(&custom_404) {
        let body = maybe_inject_hotreload(body, HTML, ctx.ws_port);
        return send_body(request, 404, HTML, body, ctx);
    }

    send_body(request, 404, PLAIN, b"404 Not Found".to_vec(), ctx)
}

/// Respond 405 for anything but GET and HEAD.
pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    let mut response = Response::from_data(b"405 Method Not Allowed".to_vec())
        .with_status_code(StatusCode(405));
    add_headers(&mut response, [("Content-Type", PLAIN), ("Allow", "GET, HEAD")]);
    request.respond(response)?;
    Ok(())
}

/// Respond with the loading page while the initial build runs.
///
/// 503 tells the page's poller the real output is not there yet.
pub fn respond_loading(request: Request) -> Result<()> {
    use crate::embed::serve::{LOADING_HTML, LoadingVars};

    let body = if is_head_request(&request) {
        String::new()
    } else {
        LOADING_HTML.render(&LoadingVars {
            version: env!("CARGO_PKG_VERSION"),
        })
    };
    let mut response = Response::from_string(body).with_status_code(StatusCode(503));
    add_headers(
        &mut response,
        [("Content-Type", HTML), ("Retry-After", "1"), ("Cache-Control", "no-store")],
    );
    request.respond(response)?;
    Ok(())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    let mut response = Response::from_data(b"503 Service Unavailable".to_vec())
        .with_status_code(StatusCode(503));
    add_headers(&mut response, [("Content-Type", PLAIN)]);
    request.respond(response)?;
    Ok(())
}

/// Respond with hotreload.js from memory.
pub fn respond_hotreload_js(request: Request, ws_port: u16, ctx: &ServeContext) -> Result<()> {
    use crate::embed::serve::{HOTRELOAD_JS, HotreloadVars};

    let body = HOTRELOAD_JS.render(&HotreloadVars { ws_port });
    send_body(request, 200, JAVASCRIPT, body.into_bytes(), ctx)
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let mut response = Response::empty(StatusCode(status));
    add_headers(&mut response, [("Content-Type", content_type), ("Cache-Control", "no-cache")]);
    request.respond(response)?;
    Ok(())
}

/// Send a body, gzipped when enabled, accepted and worthwhile.
fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    ctx: &ServeContext,
) -> Result<()> {
    let compress =
        ctx.compress && should_compress(content_type, body.len()) && accepts_gzip(&request);
    let body = if compress { gzip(&body)? } else { body };

    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    add_headers(&mut response, [("Content-Type", content_type), ("Cache-Control", "no-cache")]);
    if compress {
        add_headers(
            &mut response,
            [("Content-Encoding", "gzip"), ("Vary", "Accept-Encoding")],
        );
    }
    request.respond(response)?;
    Ok(())
}

fn add_headers<R: std::io::Read, const N: usize>(
    response: &mut Response<R>,
    headers: [(&str, &str); N],
) {
    for (field, value) in headers {
        if let Ok(header) = Header::from_bytes(field.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
}
