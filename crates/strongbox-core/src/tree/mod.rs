//! Namespace tree over flat secret names
//!
//! Built fresh for every listing from the names each mount reports. Folders
//! are rendered with a trailing `/`, mount points additionally show their
//! storage location.

mod node;

use node::{Node, SEP};

/// Expand every level
pub const INF: i64 = -1;

/// Root of a namespace tree
#[derive(Debug, Clone)]
pub struct Root {
    name: String,
    root: Node,
}

fn segments(name: &str) -> Vec<&str> {
    name.split(SEP).filter(|s| !s.is_empty()).collect()
}

impl Root {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: Node::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a secret
    pub fn add_file(&mut self, name: &str) {
        let segments = segments(name);
        if segments.is_empty() {
            return;
        }
        self.root.insert(&segments).leaf = true;
    }

    /// Add a mount point stored at `path`
    pub fn add_mount(&mut self, name: &str, path: impl Into<String>) {
        let segments = segments(name);
        if segments.is_empty() {
            return;
        }
        self.root.insert(&segments).mount = Some(path.into());
    }

    /// Render as a tree with a header line
    pub fn format(&self, limit: i64) -> String {
        let mut out = format!("{}\n", self.name);
        self.root.format(&mut out, "", 0, limit, false);
        out
    }

    /// Render only the folders as a tree with a header line
    pub fn format_folders(&self, limit: i64) -> String {
        let mut out = format!("{}\n", self.name);
        self.root.format(&mut out, "", 0, limit, true);
        out
    }

    /// Flat listing of every secret, with folders beyond `limit` collapsed
    pub fn list(&self, limit: i64) -> Vec<String> {
        let mut out = Vec::new();
        self.root.list(&mut out, "", 0, limit);
        out
    }

    /// Flat listing of folders only
    pub fn list_folders(&self, limit: i64) -> Vec<String> {
        let mut out = Vec::new();
        self.root.list_folders(&mut out, "", 0, limit);
        out
    }

    /// Subtree rooted at `path`, if it is a folder
    pub fn find_folder(&self, path: &str) -> Option<Root> {
        let segments = segments(path);
        let node = self.root.find(&segments)?;
        if segments.is_empty() || !node.is_folder() {
            return None;
        }
        Some(Root {
            name: format!("{}{}", segments.join("/"), SEP),
            root: node.clone(),
        })
    }

    /// Number of secrets
    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
