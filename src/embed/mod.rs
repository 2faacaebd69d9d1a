//! Embedded static resources for the dev server.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `serve` - Dev server resources (hotreload.js, loading.html)
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{HOTRELOAD_JS, HotreloadVars};
//!
//! let js = HOTRELOAD_JS.render(&HotreloadVars { ws_port: 35729 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// URL the live-reload client is served from.
    pub const HOTRELOAD_PATH: &str = "/__wasp/hotreload.js";

    /// Variables for hotreload.js.
    pub struct HotreloadVars {
        pub ws_port: u16,
    }

    impl TemplateVars for HotreloadVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__WASP_WS_PORT__", &self.ws_port.to_string())
        }
    }

    /// Variables for loading.html.
    pub struct LoadingVars<'a> {
        pub version: &'a str,
    }

    impl TemplateVars for LoadingVars<'_> {
        fn apply(&self, content: &str) -> String {
            content.replace("__VERSION__", self.version)
        }
    }

    /// Live-reload client: reconnecting WebSocket, reload and error overlay.
    pub const HOTRELOAD_JS: Template<HotreloadVars> =
        Template::new(include_str!("serve/hotreload.js"));

    /// Page answered while the initial build runs; polls until the output
    /// is ready.
    pub const LOADING_HTML: Template<LoadingVars<'static>> =
        Template::new(include_str!("serve/loading.html"));

    /// Script tag injected into served HTML.
    pub fn hotreload_tag() -> String {
        format!(r#"<script type="module" src="{HOTRELOAD_PATH}"></script>"#)
    }

}
