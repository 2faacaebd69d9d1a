//! Server lifecycle management.

use std::{
    net::{IpAddr, SocketAddr},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Result, anyhow};
use tiny_http::Server;

use crate::{actor::Coordinator, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Run the actor system on its own thread and tokio runtime.
pub fn spawn_actors(coordinator: Coordinator) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("wasp-actors".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log!("actor"; "failed to start runtime: {}", e);
                    return;
                }
            };
            if let Err(e) = runtime.block_on(coordinator.run()) {
                log!("actor"; "error: {}", e);
            }
        })?;
    Ok(handle)
}

/// Wait for the actor system to shut down (max 6 seconds).
///
/// Long enough for an in-flight pass to finish its output swap.
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..120 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    crate::debug!("serve"; "actors did not stop in time");
}
