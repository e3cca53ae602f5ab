//! Hierarchical tree built from flat relative paths.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::model::{ClassifiedPath, Node, NodeId, NodeKind};

/// Normalize a relative path: both separators become `/`, empty and `.` segments are dropped.
pub fn normalize_path(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
}

/// Arena of nodes keyed by relative path.
///
/// Node ids are only meaningful for the tree that issued them; a rebuild produces a new arena.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    index: HashMap<String, NodeId>,
}

impl PathTree {
    /// Build a tree where every terminal segment is a file.
    pub fn build<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::default();
        for path in paths {
            tree.insert(path.as_ref(), NodeKind::File);
        }
        tree.sort();
        tree
    }

    /// Build a tree using the classification of each terminal segment.
    pub fn build_classified<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a ClassifiedPath>,
    {
        let mut tree = Self::default();
        for entry in entries {
            tree.insert(&entry.path, entry.kind);
        }
        tree.sort();
        tree
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Find the node for a relative path, in either separator style.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        self.index.get(&normalize_path(path)).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node of the tree in display order (depth-first, pre-order).
    pub fn iter_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// `id` followed by its descendants in display order. Empty when `id` is unknown.
    pub fn walk(&self, id: NodeId) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: vec![id],
        }
    }

    /// Descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.walk(id).skip(1).collect()
    }

    /// Number of ancestors above `id`.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.node(id).and_then(Node::parent);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.node(parent).and_then(Node::parent);
        }
        depth
    }

    /// Write `value` to `id` and every descendant. Returns `false` when `id` is unknown.
    pub(crate) fn set_subtree_selected(&mut self, id: NodeId, value: bool) -> bool {
        let targets: Vec<NodeId> = self.walk(id).collect();
        if targets.is_empty() {
            return false;
        }
        for target in targets {
            if let Some(node) = self.node_mut(target) {
                node.selected = value;
            }
        }
        true
    }

    fn insert(&mut self, raw: &str, terminal_kind: NodeKind) {
        let trailing_separator = raw.ends_with(['/', '\\']);
        let parts: Vec<&str> = segments(raw).collect();
        if parts.is_empty() {
            tracing::trace!(path = raw, "skipping empty path");
            return;
        }

        let mut parent = None;
        let mut cumulative = String::with_capacity(raw.len());
        for (position, segment) in parts.iter().enumerate() {
            if !cumulative.is_empty() {
                cumulative.push('/');
            }
            cumulative.push_str(segment);

            let terminal = position + 1 == parts.len();
            let kind = if terminal && !trailing_separator {
                terminal_kind
            } else {
                NodeKind::Directory
            };
            parent = Some(self.get_or_insert(segment, &cumulative, kind, parent));
        }
    }

    fn get_or_insert(
        &mut self,
        name: &str,
        path: &str,
        kind: NodeKind,
        parent: Option<NodeId>,
    ) -> NodeId {
        if let Some(&existing) = self.index.get(path) {
            // A path that has children is a directory whatever order it was seen in.
            if kind.is_dir() {
                self.promote(existing);
            }
            return existing;
        }

        let id = NodeId(self.nodes.len());
        self.nodes
            .push(Node::new(name, path.to_owned(), kind, parent));
        self.index.insert(path.to_owned(), id);

        match parent.and_then(|parent| self.nodes.get_mut(parent.0)) {
            Some(parent) => {
                if let Some(children) = parent.children.as_mut() {
                    children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        id
    }

    fn promote(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.0)
            && !node.is_dir()
        {
            tracing::debug!(path = %node.relative_path, "promoting file node to directory");
            node.kind = NodeKind::Directory;
            node.children = Some(Vec::new());
        }
    }

    fn sort(&mut self) {
        let mut roots = std::mem::take(&mut self.roots);
        roots.sort_by(|a, b| self.compare(*a, *b));
        self.roots = roots;

        for position in 0..self.nodes.len() {
            let Some(mut children) = self.nodes[position].children.take() else {
                continue;
            };
            children.sort_by(|a, b| self.compare(*a, *b));
            self.nodes[position].children = Some(children);
        }
    }

    /// Directories before files, then byte-wise by name.
    fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        match (self.node(a), self.node(b)) {
            (Some(a), Some(b)) => b
                .is_dir()
                .cmp(&a.is_dir())
                .then_with(|| a.name.cmp(&b.name)),
            _ => a.cmp(&b),
        }
    }
}

/// Pre-order traversal over node ids. Ids that do not resolve are skipped.
#[derive(Debug, Clone)]
pub struct DepthFirst<'a> {
    tree: &'a PathTree,
    stack: Vec<NodeId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.tree.node(id) {
                self.stack.extend(node.children().iter().rev().copied());
                return Some(id);
            }
        }
        None
    }
}
