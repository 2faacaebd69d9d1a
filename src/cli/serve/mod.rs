//! Development server with live reload support.
//!
//! ```text
//! main thread   : tiny_http accept ──► rayon pool ──► handle_request
//! actor thread  : tokio runtime ──► Coordinator (watch / build / ws)
//! ```
//!
//! The HTTP server is bound before the initial build so the browser gets
//! the loading page instead of a connection error.

mod compress;
mod content;
mod lifecycle;
mod path;
mod response;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel;
use tiny_http::{Method, Request, Server};

use crate::{
    actor::Coordinator,
    config::WaspConfig,
    core::{StateCell, is_shutdown, register_server},
    embed::serve::HOTRELOAD_PATH,
    log,
    pipeline::Pipeline,
};

/// Request handler threads.
const HTTP_THREADS: usize = 4;

/// What every request handler needs to know.
pub(crate) struct ServeContext {
    output_dir: PathBuf,
    compress: bool,
    /// Actual live-reload port, `None` without watch mode.
    ws_port: Option<u16>,
    state: Arc<StateCell>,
}

/// `wasp serve`: bind, build, then serve until Ctrl+C.
pub fn serve(config: Arc<WaspConfig>) -> Result<()> {
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&config))?);
    if config.build.clean {
        pipeline.clean()?;
    }

    let serve = &config.serve;
    let (server, addr) = lifecycle::bind_with_retry(serve.interface, serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    let state = StateCell::new();
    let coordinator =
        Coordinator::new(Arc::clone(&pipeline), Arc::clone(&state)).with_shutdown_signal(shutdown_rx);

    let ws_port = if serve.watch {
        let port = coordinator.start_reload_server(serve.interface, serve.ws_port)?;
        crate::debug!("hotreload"; "ws://{}:{}", serve.interface, port);
        Some(port)
    } else {
        None
    };

    log!("serve"; "http://{}", addr);

    let ctx = Arc::new(ServeContext {
        output_dir: pipeline.target().output_dir().to_path_buf(),
        compress: serve.compress,
        ws_port,
        state: Arc::clone(&state),
    });

    let actors = lifecycle::spawn_actors(coordinator)?;
    let result = run_request_loop(&server, &ctx);

    state.stop();
    lifecycle::wait_for_shutdown(actors);
    result
}

fn run_request_loop(server: &Server, ctx: &Arc<ServeContext>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(HTTP_THREADS)
        .thread_name(|i| format!("wasp-http-{i}"))
        .build()
        .context("failed to create HTTP thread pool")?;

    for request in server.incoming_requests() {
        let ctx = Arc::clone(ctx);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, ctx: &ServeContext) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    // Served from memory, independent of the build state
    if let Some(port) = ctx.ws_port
        && path::url_path(request.url()) == HOTRELOAD_PATH
    {
        return response::respond_hotreload_js(request, port, ctx);
    }

    let state = ctx.state.get();
    if !state.serves_output() {
        crate::debug!("serve"; "{} while {:?}", request.url(), state);
        return response::respond_loading(request);
    }

    match path::resolve_path(request.url(), &ctx.output_dir) {
        Some(file) => response::respond_file(request, &file, ctx),
        None => response::respond_not_found(request, ctx),
    }
}
