//! WebSocket Server for Live Reload
//!
//! Accepts browser connections and hands the raw streams to the `WsActor`,
//! which performs the handshake and owns the client list.

use std::{
    io::ErrorKind,
    net::{IpAddr, TcpListener},
    thread,
    time::Duration,
};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::{actor::messages::WsMsg, core::is_shutdown};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Start the accept loop on `interface:base_port` (or the next free port).
///
/// Returns the port actually bound, which the served pages need to know.
pub fn start_ws_server(
    interface: IpAddr,
    base_port: u16,
    ws_tx: mpsc::Sender<WsMsg>,
) -> Result<u16> {
    let (listener, actual_port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    thread::Builder::new()
        .name("wasp-ws-accept".into())
        .spawn(move || accept_loop(&listener, &ws_tx))?;

    Ok(actual_port)
}

fn accept_loop(listener: &TcpListener, ws_tx: &mpsc::Sender<WsMsg>) {
    while !is_shutdown() {
        match listener.accept() {
            Ok((stream, addr)) => {
                crate::debug!("reload"; "client connected: {}", addr);

                // Handshake and broadcast use blocking IO
                let _ = stream.set_nonblocking(false);

                if ws_tx.blocking_send(WsMsg::AddClient(stream)).is_err() {
                    crate::debug!("reload"; "ws actor gone, stopping accept loop");
                    break;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                crate::log!("reload"; "accept error: {}", e);
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
