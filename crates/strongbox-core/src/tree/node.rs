//! Trie node of the namespace tree

use std::collections::BTreeMap;

pub(crate) const SEP: char = '/';

const BRANCH: &str = "├── ";
const LAST: &str = "└── ";
const PIPE: &str = "│   ";
const BLANK: &str = "    ";

#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    pub(crate) children: BTreeMap<String, Node>,
    pub(crate) leaf: bool,
    /// Storage location if this folder is a mount point
    pub(crate) mount: Option<String>,
}

/// One rendered line below a folder; a name that is both a secret and a
/// folder yields two items
enum Item<'a> {
    Leaf(&'a str),
    Folder(&'a str, &'a Node),
}

impl Node {
    pub(crate) fn is_folder(&self) -> bool {
        !self.children.is_empty() || self.mount.is_some()
    }

    pub(crate) fn insert(&mut self, segments: &[&str]) -> &mut Node {
        match segments.split_first() {
            None => self,
            Some((first, rest)) => self
                .children
                .entry(first.to_string())
                .or_default()
                .insert(rest),
        }
    }

    pub(crate) fn find(&self, segments: &[&str]) -> Option<&Node> {
        match segments.split_first() {
            None => Some(self),
            Some((first, rest)) => self.children.get(*first)?.find(rest),
        }
    }

    pub(crate) fn len(&self) -> usize {
        usize::from(self.leaf) + self.children.values().map(Node::len).sum::<usize>()
    }

    fn items(&self) -> Vec<Item<'_>> {
        let mut items = Vec::new();
        for (name, child) in &self.children {
            if child.leaf {
                items.push(Item::Leaf(name.as_str()));
            }
            if child.is_folder() {
                items.push(Item::Folder(name.as_str(), child));
            }
        }
        items
    }

    /// Render children with box-drawing connectors
    ///
    /// Folders at `depth >= limit` are shown collapsed; negative limits
    /// expand everything. With `folders_only` secrets are left out.
    pub(crate) fn format(&self, out: &mut String, prefix: &str, depth: i64, limit: i64, folders_only: bool) {
        let items: Vec<Item<'_>> = self
            .items()
            .into_iter()
            .filter(|item| !folders_only || matches!(item, Item::Folder(..)))
            .collect();
        let count = items.len();
        for (i, item) in items.into_iter().enumerate() {
            let last = i + 1 == count;
            out.push_str(prefix);
            out.push_str(if last { LAST } else { BRANCH });
            match item {
                Item::Leaf(name) => {
                    out.push_str(name);
                    out.push('\n');
                }
                Item::Folder(name, node) => {
                    out.push_str(name);
                    out.push(SEP);
                    if let Some(path) = &node.mount {
                        out.push_str(&format!(" ({})", path));
                    }
                    out.push('\n');
                    if limit < 0 || depth < limit {
                        let prefix = format!("{}{}", prefix, if last { BLANK } else { PIPE });
                        node.format(out, &prefix, depth + 1, limit, folders_only);
                    }
                }
            }
        }
    }

    /// Flat listing of full paths; collapsed folders end with a separator
    pub(crate) fn list(&self, out: &mut Vec<String>, prefix: &str, depth: i64, limit: i64) {
        for item in self.items() {
            match item {
                Item::Leaf(name) => out.push(format!("{}{}", prefix, name)),
                Item::Folder(name, node) => {
                    let path = format!("{}{}{}", prefix, name, SEP);
                    if limit >= 0 && depth >= limit {
                        out.push(path);
                    } else {
                        node.list(out, &path, depth + 1, limit);
                    }
                }
            }
        }
    }

    /// Folder paths down to `limit` levels, each ending with a separator
    pub(crate) fn list_folders(&self, out: &mut Vec<String>, prefix: &str, depth: i64, limit: i64) {
        for item in self.items() {
            if let Item::Folder(name, node) = item {
                let path = format!("{}{}{}", prefix, name, SEP);
                out.push(path.clone());
                if limit < 0 || depth < limit {
                    node.list_folders(out, &path, depth + 1, limit);
                }
            }
        }
    }
}
