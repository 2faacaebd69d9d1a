//! Actor System for the Dev Server
//!
//! Message-passing concurrency for watch mode:
//!
//! ```text
//! FsActor --RebuildQueue--> BuildActor --WsMsg--> WsActor
//! (watch)                   (pipeline)           (broadcast)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `build` - Serialized orchestration passes and state transitions
//! - `ws` - WebSocket broadcast
//! - `coordinator` - Wires up and runs actors

pub mod build;
pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod ws;

pub use coordinator::Coordinator;
