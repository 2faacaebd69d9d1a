//! WebSocket Actor
//!
//! Owns the live-reload clients: finishes handshakes, broadcasts reload and
//! error messages, and remembers the last build error so a browser that
//! connects (or reconnects) while the build is broken sees the overlay.

use std::net::TcpStream;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::messages::WsMsg;
use crate::reload::message::HotReloadMessage;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// WebSocket Actor - manages client connections and broadcasts
pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    clients: Clients,
    /// Last build error as `(path, error)`, replayed to new clients
    pending_error: Mutex<Option<(String, String)>>,
}

impl WsActor {
    pub fn new(rx: mpsc::Receiver<WsMsg>) -> Self {
        Self {
            rx,
            clients: Arc::new(Mutex::new(Vec::new())),
            pending_error: Mutex::new(None),
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let clients = Arc::downgrade(&self.clients);
        std::thread::spawn(move || reap_closed_clients(&clients));

        while let Some(msg) = self.rx.recv().await {
            match msg {
                WsMsg::Reload { reason } => {
                    crate::debug!("ws"; "sending reload: {}", reason);
                    self.broadcast(&HotReloadMessage::reload_with_reason(reason));
                }
                WsMsg::Error { path, error } => {
                    let msg = HotReloadMessage::error(&path, &error);
                    *self.pending_error.lock() = Some((path, error));
                    self.broadcast(&msg);
                }
                WsMsg::ClearError => {
                    *self.pending_error.lock() = None;
                    self.broadcast(&HotReloadMessage::clear_error());
                }
                WsMsg::AddClient(stream) => self.add_client(stream),
                WsMsg::Shutdown => {
                    crate::debug!("ws"; "shutting down");
                    for mut client in self.clients.lock().drain(..) {
                        let _ = client.close(None);
                        let _ = client.flush();
                    }
                    break;
                }
            }
        }
    }

    fn add_client(&self, stream: TcpStream) {
        // Handshake in blocking mode, poll reads afterwards
        let mut ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                crate::log!("ws"; "handshake failed: {}", e);
                return;
            }
        };
        let _ = ws.get_ref().set_nonblocking(true);

        if let Err(e) = send(&mut ws, &HotReloadMessage::connected()) {
            crate::log!("ws"; "failed to send connected message: {}", e);
            return;
        }

        if let Some((path, error)) = &*self.pending_error.lock() {
            match send(&mut ws, &HotReloadMessage::error(path, error)) {
                Ok(()) => crate::debug!("ws"; "sent pending error to new client"),
                Err(e) => crate::log!("ws"; "failed to send pending error: {}", e),
            }
        }

        let mut clients = self.clients.lock();
        clients.push(ws);
        crate::debug!("ws"; "client connected (total: {})", clients.len());
    }

    /// Broadcast a message to all connected clients, dropping dead ones.
    fn broadcast(&self, msg: &HotReloadMessage) {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            crate::debug!("ws"; "no clients connected");
            return;
        }

        clients.retain_mut(|ws| match send(ws, msg) {
            Ok(()) => true,
            Err(e) => {
                crate::debug!("ws"; "client disconnected: {}", e);
                false
            }
        });
        crate::debug!("ws"; "broadcast to {} clients", clients.len());
    }
}

fn send(ws: &mut WebSocket<TcpStream>, msg: &HotReloadMessage) -> tungstenite::Result<()> {
    ws.send(Message::Text(msg.to_json().into()))
}

/// Poll clients for close frames until the actor is gone.
///
/// Clients never send anything meaningful; reading is only needed to notice
/// closed tabs and to answer pings.
fn reap_closed_clients(clients: &Weak<Mutex<Vec<WebSocket<TcpStream>>>>) {
    while let Some(clients) = clients.upgrade() {
        clients.lock().retain_mut(|ws| match ws.read() {
            Ok(Message::Close(_)) => false,
            Ok(_) => true,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        });
        drop(clients);
        std::thread::sleep(Duration::from_millis(100));
    }
}
