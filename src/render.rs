//! Template renderer adapter.
//!
//! Injects one reference tag per artifact into the HTML template, at the
//! `<!-- wasp:inject -->` placeholder, or else before `</head>`, or else
//! before `</body>`. Rendering is a pure function of the template contents,
//! the artifacts and the renderer settings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::WaspConfig;
use crate::core::{CompiledArtifact, RenderedDocument};
use crate::utils::html::escape_attr;

/// Marker replaced by the artifact tags.
pub const PLACEHOLDER: &str = "<!-- wasp:inject -->";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot read template {}", path.display())]
    UnreadableTemplate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed template {}: {reason}", path.display())]
    MalformedTemplate { path: PathBuf, reason: &'static str },
}

#[derive(Debug, Clone)]
pub struct Renderer {
    output_dir: PathBuf,
    public_url: String,
    auto_init: bool,
}

impl Renderer {
    pub fn new(config: &WaspConfig) -> Self {
        Self {
            output_dir: config.build.output.clone(),
            public_url: config.build.public_url.clone(),
            auto_init: config.build.auto_init,
        }
    }

    /// Render `template_path` referencing `artifacts` in the given order.
    ///
    /// Artifact paths are where the files will live in the output directory;
    /// only their file names end up in the document.
    pub fn render(
        &self,
        template_path: &Path,
        artifacts: &[CompiledArtifact],
    ) -> Result<RenderedDocument, RenderError> {
        let bytes = fs::read(template_path).map_err(|source| RenderError::UnreadableTemplate {
            path: template_path.to_path_buf(),
            source,
        })?;
        let malformed = |reason| RenderError::MalformedTemplate {
            path: template_path.to_path_buf(),
            reason,
        };
        let template = String::from_utf8(bytes).map_err(|_| malformed("not valid UTF-8"))?;

        let tags = self.tags(artifacts);
        let contents = inject(&template, &tags).map_err(malformed)?;

        let name = template_path
            .file_name()
            .map_or_else(|| "index.html".into(), |n| n.to_os_string());

        Ok(RenderedDocument {
            file_path: self.output_dir.join(name),
            referenced_artifacts: artifacts.iter().map(|a| a.file_path.clone()).collect(),
            contents,
        })
    }

    fn tags(&self, artifacts: &[CompiledArtifact]) -> String {
        let mut glue_initialized = false;
        artifacts
            .iter()
            .map(|artifact| {
                let url = format!("{}{}", self.public_url, artifact.file_name());
                let url = escape_attr(&url);
                match artifact.extension() {
                    Some("wasm") => format!(
                        r#"<link rel="preload" href="{url}" as="fetch" type="application/wasm" crossorigin>"#
                    ),
                    // The first script is the bindgen glue: its default export
                    // instantiates the module.
                    Some("js" | "mjs") if self.auto_init && !glue_initialized => {
                        glue_initialized = true;
                        format!(r#"<script type="module">import init from "{url}"; init();</script>"#)
                    }
                    Some("js" | "mjs") => format!(r#"<script type="module" src="{url}"></script>"#),
                    Some("css") => format!(r#"<link rel="stylesheet" href="{url}">"#),
                    _ => format!(r#"<link rel="prefetch" href="{url}">"#),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Insert `tags` at the injection point of `template`.
fn inject(template: &str, tags: &str) -> Result<String, &'static str> {
    match template.matches(PLACEHOLDER).count() {
        0 => {}
        1 => return Ok(template.replacen(PLACEHOLDER, tags, 1)),
        _ => return Err("injection placeholder appears more than once"),
    }

    // ASCII lowercasing keeps byte offsets intact.
    let lower = template.to_ascii_lowercase();
    let pos = lower
        .find("</head>")
        .or_else(|| lower.rfind("</body>"))
        .ok_or("no injection placeholder, </head> or </body>")?;

    let mut result = String::with_capacity(template.len() + tags.len() + 1);
    result.push_str(&template[..pos]);
    result.push_str(tags);
    result.push('\n');
    result.push_str(&template[pos..]);
    Ok(result)
}
