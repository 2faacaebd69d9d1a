//! Asset graph: build inputs, build stages and the edges between them.
//!
//! ```text
//!   Source ──┐
//!            ├──► Compile ──┐
//!   Config ──┤              ├──► Render ──┐
//!            └──────────────┤             ├──► Emit
//!   Template ───────────────┘             │
//!   Static ───────────────────────────────┘
//! ```
//!
//! The graph answers two questions: which input does a changed path belong
//! to, and which stages must rerun (in order) when a set of inputs changed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::WaspConfig;
use crate::core::BuildTarget;
use crate::freshness::{ContentHash, fingerprint_files, walk_files};
use crate::utils::path::is_temp_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputKind {
    Source,
    Template,
    Static,
    Config,
}

impl InputKind {
    pub const ALL: [Self; 4] = [Self::Source, Self::Template, Self::Static, Self::Config];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Template => "template",
            Self::Static => "static",
            Self::Config => "config",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Compile,
    Render,
    Emit,
}

impl Stage {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Render => "render",
            Self::Emit => "emit",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Input(InputKind),
    Stage(Stage),
}

const EDGES: [(Node, Node); 7] = [
    (Node::Input(InputKind::Source), Node::Stage(Stage::Compile)),
    (Node::Input(InputKind::Config), Node::Stage(Stage::Compile)),
    (Node::Stage(Stage::Compile), Node::Stage(Stage::Render)),
    (Node::Input(InputKind::Template), Node::Stage(Stage::Render)),
    (Node::Input(InputKind::Config), Node::Stage(Stage::Render)),
    (Node::Stage(Stage::Render), Node::Stage(Stage::Emit)),
    (Node::Input(InputKind::Static), Node::Stage(Stage::Emit)),
];

/// Which paths belong to which input, and which are never inputs.
#[derive(Debug, Clone)]
struct InputScope {
    source_dir: PathBuf,
    template: PathBuf,
    static_dir: Option<PathBuf>,
    config_path: PathBuf,
    excluded: Vec<PathBuf>,
    ignore: Vec<String>,
}

impl InputScope {
    /// Paths that are never inputs: build outputs, caches, VCS metadata,
    /// editor temp files, configured ignore names.
    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.iter().any(|dir| path.starts_with(dir)) || is_temp_file(path) {
            return true;
        }
        let rel = [Some(&self.source_dir), self.static_dir.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|base| path.strip_prefix(base).ok());
        let Some(rel) = rel else {
            return true;
        };
        rel.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            name.starts_with('.') || self.ignore.iter().any(|n| *n == name)
        })
    }

    /// Under the static directory and not claimed by a source directory
    /// at or below it.
    fn in_static(&self, path: &Path) -> bool {
        let Some(dir) = &self.static_dir else {
            return false;
        };
        path.starts_with(dir)
            && !(self.source_dir.starts_with(dir) && path.starts_with(&self.source_dir))
    }

    fn classify(&self, path: &Path) -> Option<InputKind> {
        if path == self.config_path {
            return Some(InputKind::Config);
        }
        if path == self.template {
            return Some(InputKind::Template);
        }
        if self.is_excluded(path) {
            return None;
        }
        if self.in_static(path) {
            return Some(InputKind::Static);
        }
        path.starts_with(&self.source_dir).then_some(InputKind::Source)
    }
}

/// Inputs and stages of one [`BuildTarget`], with their dependency edges.
#[derive(Debug, Clone)]
pub struct AssetGraph {
    scope: Arc<InputScope>,
    /// All nodes in topological order.
    order: Vec<Node>,
}

impl AssetGraph {
    pub fn new(config: &WaspConfig, target: &BuildTarget) -> Self {
        let scope = InputScope {
            source_dir: target.source_dir().to_path_buf(),
            template: target.template().to_path_buf(),
            static_dir: target.static_dir().map(Path::to_path_buf),
            config_path: config.config_path.clone(),
            excluded: vec![
                target.output_dir().to_path_buf(),
                target.cache_dir().to_path_buf(),
                target.staging_dir(),
                target.retired_dir(),
            ],
            ignore: config.build.ignore.clone(),
        };

        Self {
            scope: Arc::new(scope),
            order: topological_order(),
        }
    }

    /// Input a changed path belongs to, `None` for paths that never affect
    /// the build.
    pub fn classify(&self, path: &Path) -> Option<InputKind> {
        self.scope.classify(path)
    }

    /// Directories to watch recursively, without nested duplicates.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let scope = &self.scope;
        let mut candidates: Vec<PathBuf> = [
            Some(scope.source_dir.clone()),
            scope.template.parent().map(Path::to_path_buf),
            scope.static_dir.clone(),
            scope.config_path.parent().map(Path::to_path_buf),
        ]
        .into_iter()
        .flatten()
        .filter(|dir| dir.is_dir())
        .collect();

        candidates.sort();
        candidates.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for dir in candidates {
            if !roots.iter().any(|root| dir.starts_with(root)) {
                roots.push(dir);
            }
        }
        roots
    }

    /// Files currently making up `kind`, sorted.
    pub fn input_files(&self, kind: InputKind) -> Vec<PathBuf> {
        let scope = &self.scope;
        match kind {
            InputKind::Config => existing(&scope.config_path),
            InputKind::Template => existing(&scope.template),
            InputKind::Static => match &scope.static_dir {
                Some(dir) => {
                    let scope = Arc::clone(&self.scope);
                    walk_files(dir, move |p| scope.classify(p) != Some(InputKind::Static))
                }
                None => Vec::new(),
            },
            InputKind::Source => {
                let scope = Arc::clone(&self.scope);
                walk_files(&self.scope.source_dir, move |p| {
                    scope.classify(p) != Some(InputKind::Source)
                })
            }
        }
    }

    /// Content fingerprint of one input.
    pub fn fingerprint(&self, kind: InputKind) -> ContentHash {
        let base = match kind {
            InputKind::Static => self.scope.static_dir.as_deref().unwrap_or(&self.scope.source_dir),
            _ => &self.scope.source_dir,
        };
        fingerprint_files(base, &self.input_files(kind))
    }

    /// Stages that must rerun when `changed` inputs changed, in execution
    /// order.
    pub fn stale_stages(&self, changed: &[InputKind]) -> Vec<Stage> {
        let mut dirty: FxHashSet<Node> = changed.iter().copied().map(Node::Input).collect();

        // Nodes are visited in topological order, so every predecessor has
        // been decided before its successors.
        for node in &self.order {
            if dirty.contains(node) {
                continue;
            }
            let upstream_dirty = EDGES
                .iter()
                .any(|(from, to)| to == node && dirty.contains(from));
            if upstream_dirty {
                dirty.insert(*node);
            }
        }

        self.stages()
            .filter(|stage| dirty.contains(&Node::Stage(*stage)))
            .collect()
    }

    /// All stages in execution order.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.order.iter().filter_map(|node| match node {
            Node::Stage(stage) => Some(*stage),
            Node::Input(_) => None,
        })
    }
}

fn existing(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        Vec::new()
    }
}

/// Kahn's algorithm over the fixed node set.
///
/// Ties are broken by declaration order so the result is deterministic.
fn topological_order() -> Vec<Node> {
    let nodes: Vec<Node> = InputKind::ALL
        .into_iter()
        .map(Node::Input)
        .chain([Stage::Compile, Stage::Render, Stage::Emit].map(Node::Stage))
        .collect();

    let mut in_degree: FxHashMap<Node, usize> = nodes.iter().map(|n| (*n, 0)).collect();
    for (_, to) in &EDGES {
        *in_degree.entry(*to).or_default() += 1;
    }

    let mut ready: Vec<Node> = nodes
        .iter()
        .filter(|n| in_degree[*n] == 0)
        .copied()
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while !ready.is_empty() {
        let node = ready.remove(0);
        order.push(node);
        for (from, to) in &EDGES {
            if *from != node {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(to) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(*to);
                }
            }
        }
    }

    debug_assert_eq!(order.len(), nodes.len(), "asset graph has a cycle");
    order
}
