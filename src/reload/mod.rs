//! Reload Module
//!
//! Live reload plumbing for the development server.
//!
//! ```text
//! FsActor ──RebuildQueue──▶ BuildActor ──WsMsg──▶ WsActor ──▶ Browser
//!  (watch)   (coalesce)      (pipeline)          (broadcast)
//! ```
//!
//! - `message` - JSON messages pushed to browser clients
//! - `queue` - Rebuild requests, at most one in flight and one pending
//! - `server` - WebSocket listener handing clients to the `WsActor`

pub mod message;
pub mod queue;
pub mod server;
