//! Actor Message Definitions
//!
//! Rebuild requests travel through [`crate::reload::queue`]; everything
//! bound for browser clients goes through [`WsMsg`].

use std::net::TcpStream;

/// Messages to WebSocket Actor
#[derive(Debug)]
pub enum WsMsg {
    /// Reload all clients
    Reload { reason: String },
    /// Build error (display overlay, no reload)
    Error { path: String, error: String },
    /// Clear error overlay (rebuild succeeded after error)
    ClearError,
    /// Raw connection from the accept loop, handshake pending
    AddClient(TcpStream),
    /// Close all clients and stop
    Shutdown,
}
