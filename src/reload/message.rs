//! Hot Reload Message Protocol
//!
//! JSON messages sent over WebSocket from the development server to
//! browser clients.
//!
//! # Message Types
//!
//! - `reload`: Trigger full page reload
//! - `connected`: Sent once after the handshake
//! - `error`: Show the build error overlay (page is not reloaded)
//! - `clear_error`: Hide the overlay after a successful rebuild

use serde::{Deserialize, Serialize};

/// Hot reload message sent over WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HotReloadMessage {
    /// Full page reload
    Reload {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Connection established
    Connected {
        /// Server version for compatibility check
        version: String,
    },

    /// Build failure (display overlay, no reload)
    Error {
        /// Pipeline stage or file that failed
        path: String,
        error: String,
    },

    /// Clear error overlay (rebuild succeeded after an error)
    #[serde(rename = "clear_error")]
    ClearError,
}

impl HotReloadMessage {
    #[cfg(test)]
    pub fn reload() -> Self {
        Self::Reload { reason: None }
    }

    pub fn reload_with_reason(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn error(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            path: path.into(),
            error: error.into(),
        }
    }

    pub fn clear_error() -> Self {
        Self::ClearError
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }

    /// Parse from JSON string
    #[cfg(test)]
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_message() {
        let msg = HotReloadMessage::reload_with_reason("src/lib.rs changed");
        let json = msg.to_json();
        assert!(json.contains(r#""type":"reload""#));
        assert!(json.contains(r#""reason":"src/lib.rs changed""#));
    }

    #[test]
    fn test_reload_without_reason_omits_field() {
        assert_eq!(HotReloadMessage::reload().to_json(), r#"{"type":"reload"}"#);
    }

    #[test]
    fn test_clear_error_tag() {
        assert_eq!(
            HotReloadMessage::clear_error().to_json(),
            r#"{"type":"clear_error"}"#
        );
    }

    #[test]
    fn test_error_roundtrip() {
        let msg = HotReloadMessage::error("compile", "error[E0308]: mismatched types");
        let parsed = HotReloadMessage::from_json(&msg.to_json()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_connected_carries_version() {
        let HotReloadMessage::Connected { version } = HotReloadMessage::connected() else {
            panic!("expected Connected");
        };
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_from_json_rejects_unknown() {
        assert!(HotReloadMessage::from_json(r#"{"type":"patch"}"#).is_none());
    }
}
